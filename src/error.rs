use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("source text must be at least {min} characters long (got {actual})")]
    SourceTooShort { min: usize, actual: usize },
    #[error("API key not set. Add it to config.json or set OPENAI_API_KEY.")]
    MissingApiKey,
    #[error("API key contains characters that cannot be sent in a request header")]
    InvalidApiKey,
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("the model response did not contain any content")]
    EmptyContent,
    #[error("the model returned malformed JSON: {0}")]
    MalformedJson(#[source] serde_json::Error),
    #[error("the model returned an invalid value for {field}: expected {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to create config directory: {0}")]
    CreateDir(std::io::Error),
    #[error("failed to write config file: {0}")]
    Write(std::io::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("validation failed: {}", describe_fields(.0))]
    Validation(Vec<FieldError>),
    #[error("unauthorized")]
    Unauthorized,
    #[error("report with id {id} not found")]
    NotFound { id: i64 },
    #[error(transparent)]
    Generation(#[from] GenerateError),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Serializable error envelope for API-style callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl CommandError {
    pub fn status_code(&self) -> u16 {
        match self {
            CommandError::Validation(_) => 400,
            CommandError::Unauthorized => 401,
            CommandError::NotFound { .. } => 404,
            CommandError::Generation(GenerateError::SourceTooShort { .. }) => 400,
            CommandError::Generation(GenerateError::MissingApiKey | GenerateError::InvalidApiKey) => 500,
            CommandError::Generation(_) => 502,
            CommandError::Database(_) | CommandError::Config(_) | CommandError::Io(_) => 500,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let status_code = self.status_code();
        match self {
            CommandError::Validation(errors) => ErrorResponse {
                status_code,
                message: "Validation failed".to_string(),
                details: Some(json!({ "fields": errors })),
            },
            _ if status_code == 500 => ErrorResponse {
                status_code,
                message: "Internal server error".to_string(),
                details: Some(json!({ "originalError": self.to_string() })),
            },
            _ => ErrorResponse {
                status_code,
                message: self.to_string(),
                details: None,
            },
        }
    }
}
