use crate::error::ConfigError;
use crate::listing::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::sections::ColumnMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_output_language")]
    pub output_language: String,
    #[serde(default)]
    pub column_mode: ColumnMode,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub user_id: String,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_output_language() -> String {
    "Polish".to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            api_url: default_api_url(),
            output_language: default_output_language(),
            column_mode: ColumnMode::default(),
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout_secs(),
            user_id: String::new(),
        }
    }
}

impl AppConfig {
    /// Apply overrides from a variable lookup. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(key) = get("OPENAI_API_KEY") {
            self.api_key = key;
        }
        if let Some(model) = get("REPORT_DIGEST_MODEL") {
            self.model = model;
        }
        if let Some(url) = get("REPORT_DIGEST_API_URL") {
            self.api_url = url;
        }
        if let Some(user) = get("REPORT_DIGEST_USER") {
            self.user_id = user;
        }
    }

    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|name| std::env::var(name).ok());
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn api_key_set(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Masked key for display: first and last four characters only.
    pub fn api_key_preview(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() > 8 {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{}...{}", head, tail)
        } else if !chars.is_empty() {
            "****".to_string()
        } else {
            String::new()
        }
    }
}

pub fn get_config_path(app_data_dir: &Path) -> PathBuf {
    app_data_dir.join("config.json")
}

pub fn load_config(app_data_dir: &Path) -> AppConfig {
    let path = get_config_path(app_data_dir);
    match fs::read_to_string(&path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
            AppConfig::default()
        }),
        Err(_) => AppConfig::default(),
    }
}

pub fn save_config(app_data_dir: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let path = get_config_path(app_data_dir);
    fs::create_dir_all(app_data_dir).map_err(ConfigError::CreateDir)?;
    let content = serde_json::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    fs::write(&path, content).map_err(ConfigError::Write)?;
    Ok(())
}

/// Local installs have no sign-in; the first run mints a stable owner id.
pub fn ensure_user_id(app_data_dir: &Path, config: &mut AppConfig) -> Result<String, ConfigError> {
    if config.user_id.trim().is_empty() {
        config.user_id = uuid::Uuid::new_v4().to_string();
        save_config(app_data_dir, config)?;
        tracing::info!(user_id = %config.user_id, "created local user id");
    }
    Ok(config.user_id.clone())
}
