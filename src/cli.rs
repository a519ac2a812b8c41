use crate::commands::{self, AppState, GenerateReportCommand, SettingsUpdate};
use crate::config;
use crate::editor::{EditorSession, SectionKind};
use crate::export::ExportFormat;
use crate::listing::{ListQuery, PageLink};
use crate::sections::ColumnMode;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "report-digest")]
#[command(about = "Generate, edit and manage structured text reports")]
pub struct Cli {
    /// Directory holding config.json and the report database
    #[arg(long, global = true, env = "REPORT_DIGEST_DATA_DIR", default_value = ".report-digest")]
    data_dir: PathBuf,
    /// Owner of the reports (defaults to the id stored in config.json)
    #[arg(long, global = true)]
    user: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a report preview from source text
    Generate {
        /// Source text file, or "-" for stdin
        #[arg(long, default_value = "-")]
        input: String,
        /// Title to use instead of the one suggested from the summary
        #[arg(long)]
        title: Option<String>,
        /// Save the preview as a new report
        #[arg(long)]
        save: bool,
    },
    /// List saved reports
    List {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
        /// Substring matched against title and summary
        #[arg(long)]
        filter: Option<String>,
        /// Sort order, e.g. "createdAt.desc" or "title.asc"
        #[arg(long)]
        sort: Option<String>,
    },
    /// Show a report as it appears in the editor
    Show {
        id: i64,
        /// Print the stored row as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit fields of a saved report; "@path" reads a value from a file
    Edit {
        id: i64,
        #[arg(long, allow_hyphen_values = true)]
        title: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        summary: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        conclusions: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        key_data: Option<String>,
    },
    /// Delete a report
    Delete { id: i64 },
    /// Export a report for printing
    Export {
        id: i64,
        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: ExportFormat,
        /// Write to this file instead of stdout; the format's extension is
        /// added when the path has none
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show or change settings
    Config {
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        api_url: Option<String>,
        /// Language the model writes the report in
        #[arg(long)]
        language: Option<String>,
        /// How section columns are stored: list or text
        #[arg(long)]
        column_mode: Option<ColumnMode>,
        #[arg(long)]
        page_size: Option<u32>,
    },
}

pub async fn run() -> anyhow::Result<()> {
    execute(Cli::parse()).await
}

pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let mut state = AppState::open(&cli.data_dir)
        .with_context(|| format!("failed to open data directory {}", cli.data_dir.display()))?;

    match cli.command {
        Commands::Generate { input, title, save } => {
            let user_id = resolve_user(&mut state, cli.user)?;
            let original_text = read_input(&input)?;
            let generated =
                commands::generate_report(&state, &user_id, &GenerateReportCommand { original_text }).await?;
            let mut session = EditorSession::from_generated(&generated);
            if let Some(title) = title {
                session.set_title(&title);
            }
            if save {
                let report = commands::save_session(&state, &user_id, &mut session)?;
                println!("Saved report {}", report.id);
            }
            print_session(&session);
        }
        Commands::List { page, limit, filter, sort } => {
            let user_id = resolve_user(&mut state, cli.user)?;
            let limit = limit.or(Some(state.config.page_size()));
            let query = ListQuery::new(page, limit, filter.as_deref(), sort.as_deref());
            let result = commands::list_reports(&state, &user_id, &query)?;
            if result.reports.is_empty() {
                println!("No reports found.");
            }
            for report in &result.reports {
                println!("#{:<5} {}  {}", report.id, report.created_at, report.title);
            }
            let pagination = result.pagination;
            println!(
                "Page {} of {} ({} reports)  {}",
                pagination.page,
                pagination.total_pages().max(1),
                pagination.total,
                format_links(&pagination.links(1), pagination.page)
            );
        }
        Commands::Show { id, json } => {
            let user_id = resolve_user(&mut state, cli.user)?;
            let report = commands::get_report(&state, &user_id, id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_session(&EditorSession::from_persisted(&report));
            }
        }
        Commands::Edit {
            id,
            title,
            summary,
            conclusions,
            key_data,
        } => {
            let user_id = resolve_user(&mut state, cli.user)?;
            let report = commands::get_report(&state, &user_id, id)?;
            let mut session = EditorSession::from_persisted(&report);
            if let Some(title) = title {
                session.set_title(&read_value(&title)?);
            }
            let edits = [
                (SectionKind::Summary, summary),
                (SectionKind::Conclusions, conclusions),
                (SectionKind::KeyData, key_data),
            ];
            for (kind, value) in edits {
                if let Some(value) = value {
                    session.apply_edit(kind, &read_value(&value)?);
                }
            }
            commands::update_from_session(&state, &user_id, id, &mut session)?;
            print_session(&session);
        }
        Commands::Delete { id } => {
            let user_id = resolve_user(&mut state, cli.user)?;
            commands::delete_report(&state, &user_id, id)?;
            println!("Deleted report {}", id);
        }
        Commands::Export { id, format, out } => {
            let user_id = resolve_user(&mut state, cli.user)?;
            let document = commands::export_report(&state, &user_id, id)?;
            let rendered = document.render(format)?;
            match out {
                Some(path) => {
                    let path = output_path(path, format);
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Wrote {} (print as {})", path.display(), document.file_name);
                }
                None => print!("{}", rendered),
            }
        }
        Commands::Config {
            api_key,
            model,
            api_url,
            language,
            column_mode,
            page_size,
        } => {
            let update = SettingsUpdate {
                api_key,
                model,
                api_url,
                output_language: language,
                column_mode,
                page_size,
            };
            let changed = update.api_key.is_some()
                || update.model.is_some()
                || update.api_url.is_some()
                || update.output_language.is_some()
                || update.column_mode.is_some()
                || update.page_size.is_some();
            if changed {
                commands::save_settings(&mut state, update)?;
            }
            println!("{}", serde_json::to_string_pretty(&commands::get_settings(&state))?);
        }
    }
    Ok(())
}

fn resolve_user(state: &mut AppState, flag: Option<String>) -> anyhow::Result<String> {
    if let Some(user) = flag.filter(|u| !u.trim().is_empty()) {
        return Ok(user);
    }
    if !state.config.user_id.trim().is_empty() {
        return Ok(state.config.user_id.clone());
    }
    // Mint the id on the stored config so env overrides are not written to disk.
    let mut stored = config::load_config(&state.app_data_dir);
    let user_id = config::ensure_user_id(&state.app_data_dir, &mut stored)?;
    state.config.user_id = user_id.clone();
    Ok(user_id)
}

fn read_input(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read stdin")?;
        return Ok(text);
    }
    read_file(Path::new(input))
}

/// `@path` reads the value from a file; anything else is used as is.
fn read_value(value: &str) -> anyhow::Result<String> {
    match value.strip_prefix('@') {
        Some(path) => read_file(Path::new(path)),
        None => Ok(value.to_string()),
    }
}

fn read_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn output_path(mut path: PathBuf, format: ExportFormat) -> PathBuf {
    if path.extension().is_none() {
        path.set_extension(format.extension());
    }
    path
}

fn print_session(session: &EditorSession) {
    println!("{}", session.title());
    for kind in SectionKind::ALL {
        println!("\n[{}]\n{}", kind.label(), session.display_text(kind));
    }
}

fn format_links(links: &[PageLink], current: u32) -> String {
    links
        .iter()
        .map(|link| match link {
            PageLink::Page(page) if *page == current => format!("[{}]", page),
            PageLink::Page(page) => page.to_string(),
            PageLink::Ellipsis => "…".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn unit_cli_parses_edit_arguments() {
        let cli = Cli::try_parse_from([
            "report-digest",
            "--data-dir",
            "/tmp/reports",
            "edit",
            "7",
            "--key-data",
            "- a\n- b",
        ])
        .expect("arguments should parse");
        assert_eq!(cli.data_dir, PathBuf::from("/tmp/reports"));
        match cli.command {
            Commands::Edit { id, key_data, title, .. } => {
                assert_eq!(id, 7);
                assert_eq!(key_data.as_deref(), Some("- a\n- b"));
                assert!(title.is_none());
            }
            _ => panic!("expected edit command"),
        }
    }

    #[test]
    fn unit_cli_parses_export_format_and_column_mode() {
        let cli = Cli::try_parse_from(["report-digest", "export", "3", "--format", "json"])
            .expect("arguments should parse");
        assert!(matches!(cli.command, Commands::Export { id: 3, format: ExportFormat::Json, .. }));

        let cli = Cli::try_parse_from(["report-digest", "config", "--column-mode", "text"])
            .expect("arguments should parse");
        assert!(matches!(
            cli.command,
            Commands::Config { column_mode: Some(ColumnMode::Text), .. }
        ));

        assert!(Cli::try_parse_from(["report-digest", "export", "3", "--format", "pdf"]).is_err());
    }

    #[test]
    fn unit_read_value_supports_file_reference() {
        let dir = tempdir().expect("temp directory should exist");
        let path = dir.path().join("conclusions.txt");
        std::fs::write(&path, "- from file").expect("file should write");

        assert_eq!(read_value("plain").expect("value should read"), "plain");
        assert_eq!(
            read_value(&format!("@{}", path.display())).expect("file should read"),
            "- from file"
        );
        assert!(read_value("@/definitely/missing/file").is_err());
    }

    #[test]
    fn unit_output_path_adds_extension_only_when_missing() {
        assert_eq!(
            output_path(PathBuf::from("out/report"), ExportFormat::Json),
            PathBuf::from("out/report.json")
        );
        assert_eq!(
            output_path(PathBuf::from("report.md"), ExportFormat::Text),
            PathBuf::from("report.md")
        );
    }

    #[test]
    fn unit_format_links_marks_current_page() {
        let links = [PageLink::Page(1), PageLink::Ellipsis, PageLink::Page(4), PageLink::Page(5)];
        assert_eq!(format_links(&links, 4), "1 … [4] 5");
    }

    #[test]
    fn integration_resolve_user_prefers_flag_then_persists_generated_id() {
        let dir = tempdir().expect("temp directory should exist");
        let mut state = AppState::open(dir.path()).expect("state should open");
        state.config.user_id.clear();

        assert_eq!(
            resolve_user(&mut state, Some("alice".to_string())).expect("flag should win"),
            "alice"
        );
        let minted = resolve_user(&mut state, None).expect("id should be minted");
        assert_eq!(config::load_config(dir.path()).user_id, minted);
        assert_eq!(resolve_user(&mut state, None).expect("id should be reused"), minted);
    }
}
