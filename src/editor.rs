use crate::db::{NewReport, PersistedReport};
use crate::llm::GeneratedReport;
use crate::sections::{self, ColumnMode, SectionValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

const TITLE_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionKind {
    Summary,
    Conclusions,
    KeyData,
}

impl SectionKind {
    pub const ALL: [SectionKind; 3] = [SectionKind::Summary, SectionKind::Conclusions, SectionKind::KeyData];

    /// Summary is prose; the other sections are bullet lists.
    pub fn is_list(self) -> bool {
        !matches!(self, SectionKind::Summary)
    }

    pub fn label(self) -> &'static str {
        match self {
            SectionKind::Summary => "Summary",
            SectionKind::Conclusions => "Conclusions",
            SectionKind::KeyData => "Key Data",
        }
    }

    pub fn field_name(self) -> &'static str {
        match self {
            SectionKind::Summary => "summary",
            SectionKind::Conclusions => "conclusions",
            SectionKind::KeyData => "keyData",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

impl FromStr for SectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "summary" => Ok(SectionKind::Summary),
            "conclusions" => Ok(SectionKind::Conclusions),
            "keydata" => Ok(SectionKind::KeyData),
            other => Err(format!("unknown section '{}': expected summary, conclusions or key-data", other)),
        }
    }
}

/// One editable report field in canonical form.
///
/// `items` is empty exactly when the section is blank. `raw_text` keeps the
/// text the items were parsed from so an unchanged section can be written back
/// without re-splitting it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSection {
    items: Vec<String>,
    raw_text: Option<String>,
}

impl ReportSection {
    pub fn load(kind: SectionKind, value: &SectionValue) -> Self {
        if kind.is_list() {
            return Self::from_value(value);
        }
        match value {
            SectionValue::Text(text) => Self::prose(text),
            SectionValue::Items(items) => Self::prose(&items.join("\n")),
        }
    }

    pub fn from_value(value: &SectionValue) -> Self {
        match value {
            SectionValue::Text(text) => Self {
                items: sections::tokenize(text),
                raw_text: Some(text.clone()),
            },
            SectionValue::Items(items) => Self {
                items: sections::clean_items(items),
                raw_text: None,
            },
        }
    }

    pub fn prose(text: &str) -> Self {
        let trimmed = text.trim();
        let items = if trimmed.is_empty() { Vec::new() } else { vec![trimmed.to_string()] };
        Self {
            items,
            raw_text: Some(text.to_string()),
        }
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn raw_text(&self) -> Option<&str> {
        self.raw_text.as_deref()
    }

    pub fn is_blank(&self) -> bool {
        self.items.is_empty()
    }

    /// Formatted editor text for this section.
    pub fn display_text(&self, kind: SectionKind) -> String {
        if kind.is_list() {
            sections::to_display(&SectionValue::Items(self.items.clone()))
        } else {
            self.items.first().cloned().unwrap_or_default()
        }
    }

    /// Value handed to export: items for lists, plain text for prose.
    pub fn to_value(&self, kind: SectionKind) -> SectionValue {
        if kind.is_list() {
            SectionValue::Items(self.items.clone())
        } else {
            SectionValue::Text(self.items.first().cloned().unwrap_or_default())
        }
    }

    /// Value attached to a save command.
    pub fn commit(&self, kind: SectionKind, mode: ColumnMode) -> SectionValue {
        if !kind.is_list() {
            return self.to_value(kind);
        }
        if mode == ColumnMode::Text {
            if let Some(raw) = &self.raw_text {
                if sections::tokenize(raw) == self.items {
                    return SectionValue::Text(raw.trim().to_string());
                }
            }
        }
        sections::to_column(&self.items, mode)
    }

    fn apply_text(&mut self, kind: SectionKind, text: &str) {
        *self = if kind.is_list() {
            Self {
                items: sections::tokenize(text),
                raw_text: Some(text.to_string()),
            }
        } else {
            Self::prose(text)
        };
    }
}

/// Client-side state of a report being written or edited. Never persisted
/// directly; `EditorSession::commit` maps it into a save command.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedReportDraft {
    pub title: String,
    pub original_text: String,
    pub summary: ReportSection,
    pub conclusions: ReportSection,
    pub key_data: ReportSection,
}

impl GeneratedReportDraft {
    pub fn section(&self, kind: SectionKind) -> &ReportSection {
        match kind {
            SectionKind::Summary => &self.summary,
            SectionKind::Conclusions => &self.conclusions,
            SectionKind::KeyData => &self.key_data,
        }
    }

    fn section_mut(&mut self, kind: SectionKind) -> &mut ReportSection {
        match kind {
            SectionKind::Summary => &mut self.summary,
            SectionKind::Conclusions => &mut self.conclusions,
            SectionKind::KeyData => &mut self.key_data,
        }
    }
}

/// Notification sent to dependent views after a section changes.
#[derive(Debug)]
pub struct SectionEvent<'a> {
    pub kind: SectionKind,
    pub section: &'a ReportSection,
    pub title: &'a str,
    pub revision: u64,
}

type Observer = Box<dyn FnMut(&SectionEvent<'_>)>;

/// Editor-facing working copy of a report.
///
/// Owns the draft and the text currently shown for each section. Every edit
/// re-parses the full section text, bumps the revision and notifies observers
/// before returning, so the latest edit always wins.
pub struct EditorSession {
    draft: GeneratedReportDraft,
    display: HashMap<SectionKind, String>,
    title_edited: bool,
    revision: u64,
    observers: Vec<Observer>,
}

impl EditorSession {
    pub fn from_generated(generated: &GeneratedReport) -> Self {
        let draft = GeneratedReportDraft {
            title: suggest_title(&generated.summary),
            original_text: generated.original_text.clone(),
            summary: ReportSection::prose(&generated.summary),
            conclusions: ReportSection::load(SectionKind::Conclusions, &generated.conclusions),
            key_data: ReportSection::load(SectionKind::KeyData, &generated.key_data),
        };
        Self::with_draft(draft, false)
    }

    pub fn from_persisted(report: &PersistedReport) -> Self {
        Self::with_draft(draft_from_persisted(report), true)
    }

    fn with_draft(draft: GeneratedReportDraft, title_edited: bool) -> Self {
        let display = SectionKind::ALL
            .iter()
            .map(|&kind| (kind, draft.section(kind).display_text(kind)))
            .collect();
        Self {
            draft,
            display,
            title_edited,
            revision: 0,
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&SectionEvent<'_>) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn draft(&self) -> &GeneratedReportDraft {
        &self.draft
    }

    pub fn section(&self, kind: SectionKind) -> &ReportSection {
        self.draft.section(kind)
    }

    pub fn title(&self) -> &str {
        &self.draft.title
    }

    /// A title set here is no longer replaced by summary-based suggestions.
    pub fn set_title(&mut self, title: &str) {
        self.draft.title = title.to_string();
        self.title_edited = true;
        self.revision += 1;
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn display_text(&self, kind: SectionKind) -> &str {
        self.display.get(&kind).map(String::as_str).unwrap_or("")
    }

    pub fn apply_edit(&mut self, kind: SectionKind, text: &str) {
        self.draft.section_mut(kind).apply_text(kind, text);
        self.display.insert(kind, text.to_string());
        if kind == SectionKind::Summary && !self.title_edited {
            self.draft.title = suggest_title(text);
        }
        self.revision += 1;
        self.notify(kind);
    }

    pub fn commit(&self, mode: ColumnMode) -> NewReport {
        NewReport {
            title: self.draft.title.trim().to_string(),
            original_text: self.draft.original_text.clone(),
            summary: self.draft.summary.items().first().cloned().unwrap_or_default(),
            conclusions: self.draft.conclusions.commit(SectionKind::Conclusions, mode),
            key_data: self.draft.key_data.commit(SectionKind::KeyData, mode),
        }
    }

    /// Replace the working copy with the value the server confirmed.
    pub fn resync(&mut self, report: &PersistedReport) {
        self.draft = draft_from_persisted(report);
        for kind in SectionKind::ALL {
            self.display.insert(kind, self.draft.section(kind).display_text(kind));
        }
        self.title_edited = true;
        self.revision += 1;
        for kind in SectionKind::ALL {
            self.notify(kind);
        }
    }

    fn notify(&mut self, kind: SectionKind) {
        let event = SectionEvent {
            kind,
            section: self.draft.section(kind),
            title: &self.draft.title,
            revision: self.revision,
        };
        for observer in self.observers.iter_mut() {
            observer(&event);
        }
    }
}

fn draft_from_persisted(report: &PersistedReport) -> GeneratedReportDraft {
    GeneratedReportDraft {
        title: report.title.clone(),
        original_text: report.original_text.clone(),
        summary: ReportSection::prose(&report.summary),
        conclusions: ReportSection::load(SectionKind::Conclusions, &report.conclusions),
        key_data: ReportSection::load(SectionKind::KeyData, &report.key_data),
    }
}

/// Default title: the summary's first sentence, shortened to fit a title.
pub fn suggest_title(summary: &str) -> String {
    let first_sentence = summary.split('.').next().unwrap_or("").trim();
    if first_sentence.chars().count() > TITLE_MAX_CHARS {
        let head: String = first_sentence.chars().take(TITLE_MAX_CHARS - 3).collect();
        format!("{}...", head.trim_end())
    } else {
        first_sentence.to_string()
    }
}
