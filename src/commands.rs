use crate::config::{self, AppConfig};
use crate::db::{Database, NewReport, PersistedReport, ReportPage, ReportUpdate};
use crate::editor::{EditorSession, SectionKind};
use crate::error::{CommandError, FieldError};
use crate::export::ReportDocument;
use crate::listing::ListQuery;
use crate::llm::{self, GeneratedReport};
use crate::sections::{ColumnMode, SectionValue};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const TITLE_MAX_CHARS: usize = 255;
pub const SECTION_MAX_CHARS: usize = 10_000;

pub struct AppState {
    pub db: Database,
    pub config: AppConfig,
    pub app_data_dir: PathBuf,
}

impl AppState {
    /// Open the database and config stored under `app_data_dir`.
    pub fn open(app_data_dir: &Path) -> Result<Self, CommandError> {
        std::fs::create_dir_all(app_data_dir)?;
        let db_path = app_data_dir.join("database.sqlite");
        let db = Database::new(&db_path.to_string_lossy())?;
        let config = config::load_config(app_data_dir).with_env_overrides();
        Ok(Self {
            db,
            config,
            app_data_dir: app_data_dir.to_path_buf(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReportCommand {
    pub original_text: String,
}

pub type CreateReportCommand = NewReport;
pub type UpdateReportCommand = ReportUpdate;

#[derive(Debug, Serialize, Deserialize)]
pub struct SettingsResponse {
    pub api_key_set: bool,
    pub api_key_preview: String,
    pub model: String,
    pub api_url: String,
    pub output_language: String,
    pub column_mode: ColumnMode,
    pub page_size: u32,
    pub user_id: String,
}

#[derive(Debug, Default, Clone)]
pub struct SettingsUpdate {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub api_url: Option<String>,
    pub output_language: Option<String>,
    pub column_mode: Option<ColumnMode>,
    pub page_size: Option<u32>,
}

fn require_user(user_id: &str) -> Result<&str, CommandError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        tracing::warn!("command rejected: no user id");
        return Err(CommandError::Unauthorized);
    }
    Ok(user_id)
}

fn check_title(title: &str, errors: &mut Vec<FieldError>) {
    let len = title.trim().chars().count();
    if len == 0 {
        errors.push(FieldError::new("title", "title is required"));
    } else if len > TITLE_MAX_CHARS {
        errors.push(FieldError::new(
            "title",
            format!("title must be at most {} characters", TITLE_MAX_CHARS),
        ));
    }
}

fn check_section(field: &'static str, value: &SectionValue, errors: &mut Vec<FieldError>) {
    if value.is_blank() {
        errors.push(FieldError::new(field, format!("{} is required", field)));
    } else if value.char_len() > SECTION_MAX_CHARS {
        errors.push(FieldError::new(
            field,
            format!("{} must be at most {} characters", field, SECTION_MAX_CHARS),
        ));
    }
}

fn finish_validation(errors: Vec<FieldError>) -> Result<(), CommandError> {
    if errors.is_empty() {
        return Ok(());
    }
    tracing::warn!(fields = errors.len(), "validation failed");
    Err(CommandError::Validation(errors))
}

pub fn validate_new_report(report: &NewReport) -> Result<(), CommandError> {
    let mut errors = Vec::new();
    check_title(&report.title, &mut errors);
    if report.original_text.trim().is_empty() {
        errors.push(FieldError::new("originalText", "original text is required"));
    }
    check_section(
        SectionKind::Summary.field_name(),
        &SectionValue::Text(report.summary.clone()),
        &mut errors,
    );
    check_section(SectionKind::Conclusions.field_name(), &report.conclusions, &mut errors);
    check_section(SectionKind::KeyData.field_name(), &report.key_data, &mut errors);
    finish_validation(errors)
}

/// Same limits as creation, applied only to the fields present.
pub fn validate_update(update: &ReportUpdate) -> Result<(), CommandError> {
    let mut errors = Vec::new();
    if let Some(title) = &update.title {
        check_title(title, &mut errors);
    }
    if let Some(original_text) = &update.original_text {
        if original_text.trim().is_empty() {
            errors.push(FieldError::new("originalText", "original text is required"));
        }
    }
    if let Some(summary) = &update.summary {
        check_section(
            SectionKind::Summary.field_name(),
            &SectionValue::Text(summary.clone()),
            &mut errors,
        );
    }
    if let Some(conclusions) = &update.conclusions {
        check_section(SectionKind::Conclusions.field_name(), conclusions, &mut errors);
    }
    if let Some(key_data) = &update.key_data {
        check_section(SectionKind::KeyData.field_name(), key_data, &mut errors);
    }
    finish_validation(errors)
}

pub async fn generate_report(
    state: &AppState,
    user_id: &str,
    command: &GenerateReportCommand,
) -> Result<GeneratedReport, CommandError> {
    require_user(user_id)?;
    let report = llm::generate_report_preview(&state.config, &command.original_text).await?;
    Ok(report)
}

pub fn save_report(
    state: &AppState,
    user_id: &str,
    command: &CreateReportCommand,
) -> Result<PersistedReport, CommandError> {
    let user_id = require_user(user_id)?;
    validate_new_report(command)?;
    let report = state.db.create_report(user_id, command)?;
    tracing::info!(report_id = report.id, "report saved");
    Ok(report)
}

pub fn get_report(state: &AppState, user_id: &str, report_id: i64) -> Result<PersistedReport, CommandError> {
    let user_id = require_user(user_id)?;
    state
        .db
        .get_report(user_id, report_id)?
        .ok_or(CommandError::NotFound { id: report_id })
}

pub fn list_reports(state: &AppState, user_id: &str, query: &ListQuery) -> Result<ReportPage, CommandError> {
    let user_id = require_user(user_id)?;
    Ok(state.db.list_reports(user_id, query)?)
}

pub fn update_report(
    state: &AppState,
    user_id: &str,
    report_id: i64,
    command: &UpdateReportCommand,
) -> Result<PersistedReport, CommandError> {
    let user_id = require_user(user_id)?;
    validate_update(command)?;
    let report = state
        .db
        .update_report(user_id, report_id, command)?
        .ok_or(CommandError::NotFound { id: report_id })?;
    tracing::info!(report_id, "report updated");
    Ok(report)
}

pub fn delete_report(state: &AppState, user_id: &str, report_id: i64) -> Result<(), CommandError> {
    let user_id = require_user(user_id)?;
    if !state.db.delete_report(user_id, report_id)? {
        return Err(CommandError::NotFound { id: report_id });
    }
    tracing::info!(report_id, "report deleted");
    Ok(())
}

pub fn export_report(state: &AppState, user_id: &str, report_id: i64) -> Result<ReportDocument, CommandError> {
    let report = get_report(state, user_id, report_id)?;
    Ok(ReportDocument::from_report(&report))
}

/// Save the working copy as a new report and resync the session with the stored row.
pub fn save_session(
    state: &AppState,
    user_id: &str,
    session: &mut EditorSession,
) -> Result<PersistedReport, CommandError> {
    let command = session.commit(state.config.column_mode);
    let report = save_report(state, user_id, &command)?;
    session.resync(&report);
    Ok(report)
}

/// Write every field of the working copy back to an existing report.
pub fn update_from_session(
    state: &AppState,
    user_id: &str,
    report_id: i64,
    session: &mut EditorSession,
) -> Result<PersistedReport, CommandError> {
    let NewReport {
        title,
        original_text,
        summary,
        conclusions,
        key_data,
    } = session.commit(state.config.column_mode);
    let update = ReportUpdate {
        title: Some(title),
        original_text: Some(original_text),
        summary: Some(summary),
        conclusions: Some(conclusions),
        key_data: Some(key_data),
    };
    let report = update_report(state, user_id, report_id, &update)?;
    session.resync(&report);
    Ok(report)
}

pub fn get_settings(state: &AppState) -> SettingsResponse {
    let config = &state.config;
    SettingsResponse {
        api_key_set: config.api_key_set(),
        api_key_preview: config.api_key_preview(),
        model: config.model.clone(),
        api_url: config.api_url.clone(),
        output_language: config.output_language.clone(),
        column_mode: config.column_mode,
        page_size: config.page_size(),
        user_id: config.user_id.clone(),
    }
}

/// Persist settings to config.json. An empty API key keeps the stored one.
pub fn save_settings(state: &mut AppState, update: SettingsUpdate) -> Result<(), CommandError> {
    let mut stored = config::load_config(&state.app_data_dir);
    if let Some(key) = update.api_key.filter(|k| !k.trim().is_empty()) {
        stored.api_key = key;
    }
    if let Some(model) = update.model {
        stored.model = model;
    }
    if let Some(api_url) = update.api_url {
        stored.api_url = api_url;
    }
    if let Some(language) = update.output_language {
        stored.output_language = language;
    }
    if let Some(mode) = update.column_mode {
        stored.column_mode = mode;
    }
    if let Some(page_size) = update.page_size {
        stored.page_size = page_size;
    }
    config::save_config(&state.app_data_dir, &stored)?;
    tracing::info!("settings saved");
    state.config = stored.with_env_overrides();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const USER: &str = "user-1";

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn test_state(column_mode: ColumnMode) -> AppState {
        AppState {
            db: Database::new(":memory:").expect("in-memory database should initialize"),
            config: AppConfig {
                column_mode,
                ..AppConfig::default()
            },
            app_data_dir: PathBuf::from("."),
        }
    }

    fn valid_report() -> NewReport {
        NewReport {
            title: "Budget review".to_string(),
            original_text: "Long source text".to_string(),
            summary: "Costs rose.".to_string(),
            conclusions: SectionValue::Items(strings(&["Cut costs"])),
            key_data: SectionValue::Text("- 200 000 EUR".to_string()),
        }
    }

    fn generated() -> GeneratedReport {
        GeneratedReport {
            original_text: "Quarterly meeting notes".to_string(),
            summary: "Budget needs revision. Details below.".to_string(),
            conclusions: SectionValue::Items(strings(&["Revise budget", "Hire contractor"])),
            key_data: SectionValue::Items(strings(&[
                "budget increase request – 200 000 EUR",
                "project deadline – 30 April 2025",
            ])),
        }
    }

    fn field_names(err: CommandError) -> Vec<&'static str> {
        match err {
            CommandError::Validation(errors) => errors.iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn unit_validation_reports_every_bad_field() {
        let report = NewReport {
            title: "x".repeat(256),
            original_text: " ".to_string(),
            summary: String::new(),
            conclusions: SectionValue::Items(vec![" ".to_string()]),
            key_data: SectionValue::Text("y".repeat(SECTION_MAX_CHARS + 1)),
        };
        let err = validate_new_report(&report).expect_err("report should be rejected");
        assert_eq!(
            field_names(err),
            vec!["title", "originalText", "summary", "conclusions", "keyData"]
        );
        assert!(validate_new_report(&valid_report()).is_ok());
    }

    #[test]
    fn unit_title_limit_counts_characters() {
        let report = NewReport {
            title: "ż".repeat(TITLE_MAX_CHARS),
            ..valid_report()
        };
        assert!(validate_new_report(&report).is_ok());
    }

    #[test]
    fn unit_update_validation_ignores_absent_fields() {
        assert!(validate_update(&ReportUpdate::default()).is_ok());
        let update = ReportUpdate {
            key_data: Some(SectionValue::Items(Vec::new())),
            ..ReportUpdate::default()
        };
        assert_eq!(field_names(validate_update(&update).expect_err("update should fail")), vec!["keyData"]);
    }

    #[test]
    fn integration_commands_require_a_user() {
        let state = test_state(ColumnMode::List);
        assert!(matches!(save_report(&state, "  ", &valid_report()), Err(CommandError::Unauthorized)));
        assert!(matches!(get_report(&state, "", 1), Err(CommandError::Unauthorized)));
        assert!(matches!(
            list_reports(&state, "", &ListQuery::default()),
            Err(CommandError::Unauthorized)
        ));
    }

    #[test]
    fn integration_missing_reports_are_not_found() {
        let state = test_state(ColumnMode::List);
        assert!(matches!(get_report(&state, USER, 42), Err(CommandError::NotFound { id: 42 })));
        assert!(matches!(delete_report(&state, USER, 42), Err(CommandError::NotFound { id: 42 })));
        assert!(matches!(
            update_report(&state, USER, 42, &ReportUpdate::default()),
            Err(CommandError::NotFound { id: 42 })
        ));
    }

    #[test]
    fn integration_crud_cycle() {
        let state = test_state(ColumnMode::List);
        let saved = save_report(&state, USER, &valid_report()).expect("report should save");

        let update = ReportUpdate {
            title: Some("Renamed".to_string()),
            ..ReportUpdate::default()
        };
        let updated = update_report(&state, USER, saved.id, &update).expect("report should update");
        assert_eq!(updated.title, "Renamed");

        let page = list_reports(&state, USER, &ListQuery::default()).expect("list should succeed");
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.reports[0].title, "Renamed");

        let doc = export_report(&state, USER, saved.id).expect("export should succeed");
        assert_eq!(doc.file_name, "Renamed.pdf");

        delete_report(&state, USER, saved.id).expect("report should delete");
        assert!(matches!(get_report(&state, USER, saved.id), Err(CommandError::NotFound { .. })));
    }

    #[test]
    fn e2e_generate_edit_save_reload_in_text_mode() {
        let state = test_state(ColumnMode::Text);
        let mut session = EditorSession::from_generated(&generated());
        assert_eq!(session.title(), "Budget needs revision");

        session.apply_edit(SectionKind::Conclusions, "- A\n- B\n- C");
        let saved = save_session(&state, USER, &mut session).expect("session should save");
        assert_eq!(saved.conclusions, SectionValue::Text("- A\n- B\n- C".to_string()));
        assert_eq!(
            saved.key_data,
            SectionValue::Text(
                "- budget increase request – 200 000 EUR\n- project deadline – 30 April 2025".to_string()
            )
        );

        let reloaded = get_report(&state, USER, saved.id).expect("report should load");
        let session = EditorSession::from_persisted(&reloaded);
        assert_eq!(session.display_text(SectionKind::Conclusions), "- A\n- B\n- C");
        assert_eq!(session.section(SectionKind::Conclusions).items(), strings(&["A", "B", "C"]));
        assert_eq!(
            session.section(SectionKind::KeyData).items(),
            strings(&["budget increase request – 200 000 EUR", "project deadline – 30 April 2025"])
        );
    }

    #[test]
    fn e2e_list_mode_keeps_native_lists_and_updates_in_place() {
        let state = test_state(ColumnMode::List);
        let mut session = EditorSession::from_generated(&generated());
        let saved = save_session(&state, USER, &mut session).expect("session should save");
        assert_eq!(
            saved.conclusions,
            SectionValue::Items(strings(&["Revise budget", "Hire contractor"]))
        );

        session.apply_edit(SectionKind::KeyData, "- only one, with a comma");
        let updated = update_from_session(&state, USER, saved.id, &mut session).expect("session should update");
        assert_eq!(updated.key_data, SectionValue::Items(strings(&["only one, with a comma"])));
        assert_eq!(session.display_text(SectionKind::KeyData), "- only one, with a comma");
        assert_eq!(session.section(SectionKind::KeyData).items(), strings(&["only one, with a comma"]));
    }

    #[test]
    fn e2e_blank_section_blocks_save() {
        let state = test_state(ColumnMode::Text);
        let mut session = EditorSession::from_generated(&generated());
        session.apply_edit(SectionKind::KeyData, "  ");
        let err = save_session(&state, USER, &mut session).expect_err("blank key data should fail");
        assert_eq!(err.status_code(), 400);
        assert_eq!(field_names(err), vec!["keyData"]);
    }

    #[tokio::test]
    async fn unit_generate_report_rejects_short_text() {
        let state = test_state(ColumnMode::List);
        let command = GenerateReportCommand {
            original_text: "short".to_string(),
        };
        let err = generate_report(&state, USER, &command).await.expect_err("short text should fail");
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn integration_save_settings_keeps_key_when_blank() {
        let dir = tempdir().expect("temp directory should exist");
        let mut state = test_state(ColumnMode::List);
        state.app_data_dir = dir.path().to_path_buf();

        save_settings(
            &mut state,
            SettingsUpdate {
                api_key: Some("sk-first-key-123".to_string()),
                column_mode: Some(ColumnMode::Text),
                ..SettingsUpdate::default()
            },
        )
        .expect("settings should save");
        save_settings(
            &mut state,
            SettingsUpdate {
                api_key: Some(String::new()),
                model: Some("gpt-4o".to_string()),
                ..SettingsUpdate::default()
            },
        )
        .expect("settings should save");

        let stored = config::load_config(dir.path());
        assert_eq!(stored.api_key, "sk-first-key-123");
        assert_eq!(stored.model, "gpt-4o");
        assert_eq!(stored.column_mode, ColumnMode::Text);
        assert_eq!(state.config.column_mode, ColumnMode::Text);
    }
}
