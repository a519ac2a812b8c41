use serde::{Deserialize, Serialize};

/// Separator between items in the dash-bulleted display and storage forms.
pub const ITEM_SEPARATOR: &str = "\n- ";

const MARKER: char = '-';

/// A report section as it arrives from the model or the database: either a
/// free-form string or an already segmented list of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SectionValue {
    Text(String),
    Items(Vec<String>),
}

impl SectionValue {
    /// Canonical items for this value.
    pub fn items(&self) -> Vec<String> {
        match self {
            SectionValue::Text(text) => tokenize(text),
            SectionValue::Items(items) => clean_items(items),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            SectionValue::Text(text) => text.trim().is_empty(),
            SectionValue::Items(items) => items.iter().all(|item| item.trim().is_empty()),
        }
    }

    /// Length in characters of the value as it would be written to a text column.
    pub fn char_len(&self) -> usize {
        match self {
            SectionValue::Text(text) => text.chars().count(),
            SectionValue::Items(items) => to_storage(items).chars().count(),
        }
    }
}

impl Default for SectionValue {
    fn default() -> Self {
        SectionValue::Text(String::new())
    }
}

impl From<&str> for SectionValue {
    fn from(text: &str) -> Self {
        SectionValue::Text(text.to_string())
    }
}

impl From<String> for SectionValue {
    fn from(text: String) -> Self {
        SectionValue::Text(text)
    }
}

impl From<Vec<String>> for SectionValue {
    fn from(items: Vec<String>) -> Self {
        SectionValue::Items(items)
    }
}

/// How section columns are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnMode {
    /// Native list column; the storage formatter is bypassed.
    #[default]
    List,
    /// Single delimited string column.
    Text,
}

impl std::str::FromStr for ColumnMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "list" => Ok(ColumnMode::List),
            "text" => Ok(ColumnMode::Text),
            other => Err(format!("unknown column mode '{}': expected list or text", other)),
        }
    }
}

/// Split a display or storage string into discrete items.
///
/// Rules, first match wins:
/// 1. a single line with commas that is not already dash-marked is a
///    comma-separated list;
/// 2. text containing `"\n-"` is a dash-bulleted list;
/// 3. anything else is one item.
///
/// Every item is trimmed, empty items are dropped and a leading list marker
/// is removed whether or not it is followed by a space.
pub fn tokenize(input: &str) -> Vec<String> {
    let normalized = normalize_line_endings(input);
    let text = normalized.trim();
    if text.is_empty() {
        return Vec::new();
    }

    if text.contains(',') && !text.contains('\n') && !text.starts_with(MARKER) {
        return text
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(String::from)
            .collect();
    }

    if text.contains("\n-") {
        return text
            .split("\n-")
            .enumerate()
            .map(|(index, segment)| {
                let segment = segment.trim();
                if index == 0 {
                    strip_marker(segment)
                } else {
                    segment
                }
            })
            .filter(|item| !item.is_empty())
            .map(String::from)
            .collect();
    }

    let single = strip_marker(text);
    if single.is_empty() {
        Vec::new()
    } else {
        vec![single.to_string()]
    }
}

/// `tokenize` for values that may be absent.
pub fn tokenize_optional(input: Option<&str>) -> Vec<String> {
    input.map(tokenize).unwrap_or_default()
}

/// Render a section as the dash-bulleted text shown in the editor.
pub fn to_display(value: &SectionValue) -> String {
    match value {
        SectionValue::Items(items) => display_items(&clean_items(items)),
        SectionValue::Text(text) => display_text(text),
    }
}

/// Render canonical items as a single string for a text column.
///
/// Multiple items are stored uniformly dash-prefixed; a single item is stored
/// as plain text so prose never picks up a list marker. When the plain form
/// would not tokenize back to the same items (a lone item with a comma or a
/// leading dash), the dash-bulleted display form is stored instead.
pub fn to_storage(items: &[String]) -> String {
    let items = clean_items(items);
    let stored = match items.as_slice() {
        [] => return String::new(),
        [single] => single.clone(),
        _ => {
            let joined = items.join(ITEM_SEPARATOR);
            if !joined.starts_with(MARKER) && joined.contains(ITEM_SEPARATOR) {
                format!("- {joined}")
            } else {
                joined
            }
        }
    };
    if tokenize(&stored) == items {
        stored
    } else {
        display_items(&items)
    }
}

/// Encode canonical items for the configured column type.
pub fn to_column(items: &[String], mode: ColumnMode) -> SectionValue {
    match mode {
        ColumnMode::List => SectionValue::Items(clean_items(items)),
        ColumnMode::Text => SectionValue::Text(to_storage(items)),
    }
}

/// Remove one leading list marker and the whitespace after it.
pub fn strip_marker(item: &str) -> &str {
    match item.strip_prefix(MARKER) {
        Some(rest) => rest.trim_start(),
        None => item,
    }
}

pub(crate) fn clean_items(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn display_items(items: &[String]) -> String {
    if items.is_empty() {
        return String::new();
    }
    format!("- {}", items.join(ITEM_SEPARATOR))
}

fn display_text(text: &str) -> String {
    let normalized = normalize_line_endings(text);
    let trimmed = normalized.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.starts_with(MARKER) {
        return normalized;
    }

    if !trimmed.contains('\n') {
        // Legacy rows stored conclusions as "a, b, c".
        if trimmed.contains(',') {
            return display_items(&tokenize(trimmed));
        }
        return format!("- {trimmed}");
    }

    trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            if line.starts_with(MARKER) {
                line.to_string()
            } else {
                format!("- {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}
