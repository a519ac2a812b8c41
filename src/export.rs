//! Printable report layout handed to the document renderer.

use crate::db::PersistedReport;
use crate::editor::{EditorSession, SectionKind};
use crate::sections::SectionValue;
use serde::Serialize;
use std::fmt::Write as _;
use std::str::FromStr;

const UNTITLED: &str = "Untitled report";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "content", rename_all = "camelCase")]
pub enum ExportBody {
    Paragraph(String),
    Bullets(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSection {
    pub heading: String,
    pub body: ExportBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDocument {
    pub title: String,
    pub file_name: String,
    pub sections: Vec<ExportSection>,
}

impl ReportDocument {
    pub fn from_report(report: &PersistedReport) -> Self {
        let values = [
            (SectionKind::Summary, SectionValue::Text(report.summary.clone())),
            (SectionKind::Conclusions, report.conclusions.clone()),
            (SectionKind::KeyData, report.key_data.clone()),
        ];
        Self::build(&report.title, values.into_iter())
    }

    /// Layout of the working copy, including unsaved edits.
    pub fn from_session(session: &EditorSession) -> Self {
        Self::build(
            session.title(),
            SectionKind::ALL
                .into_iter()
                .map(|kind| (kind, session.section(kind).to_value(kind))),
        )
    }

    fn build(title: &str, values: impl Iterator<Item = (SectionKind, SectionValue)>) -> Self {
        let title = match title.trim() {
            "" => UNTITLED.to_string(),
            t => t.to_string(),
        };
        let sections = values
            .map(|(kind, value)| ExportSection {
                heading: kind.label().to_string(),
                body: section_body(kind, &value),
            })
            .collect();
        Self {
            file_name: export_file_name(&title),
            title,
            sections,
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);
        let _ = writeln!(out, "{}", "=".repeat(self.title.chars().count()));
        for section in &self.sections {
            let _ = writeln!(out, "\n{}", section.heading);
            let _ = writeln!(out, "{}", "-".repeat(section.heading.chars().count()));
            match &section.body {
                ExportBody::Paragraph(text) => {
                    let _ = writeln!(out, "{}", text);
                }
                ExportBody::Bullets(items) => {
                    for item in items {
                        let _ = writeln!(out, "• {}", item);
                    }
                }
            }
        }
        out
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn render(&self, format: ExportFormat) -> Result<String, serde_json::Error> {
        match format {
            ExportFormat::Text => Ok(self.render_text()),
            ExportFormat::Json => self.to_json(),
        }
    }
}

fn section_body(kind: SectionKind, value: &SectionValue) -> ExportBody {
    if !kind.is_list() {
        return match value {
            SectionValue::Text(text) => ExportBody::Paragraph(text.trim().to_string()),
            SectionValue::Items(items) => ExportBody::Paragraph(items.join("\n")),
        };
    }
    ExportBody::Bullets(value.items())
}

/// `<title>.pdf` with everything outside `[A-Za-z0-9_-]` replaced by `_`.
pub fn export_file_name(title: &str) -> String {
    let title = title.trim();
    let stem: String = if title.is_empty() {
        "report".to_string()
    } else {
        title
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect()
    };
    format!("{}.pdf", stem)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Text,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ExportFormat::Text),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("unknown export format '{}': expected text or json", other)),
        }
    }
}
