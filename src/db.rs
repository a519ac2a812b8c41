use crate::listing::{ListQuery, Pagination};
use crate::sections::SectionValue;
use chrono::Utc;
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedReport {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub original_text: String,
    pub summary: String,
    pub conclusions: SectionValue,
    pub key_data: SectionValue,
    pub created_at: String,
    pub updated_at: String,
}

/// Row written by `create_report`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    pub title: String,
    pub original_text: String,
    pub summary: String,
    pub conclusions: SectionValue,
    pub key_data: SectionValue,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReportUpdate {
    pub title: Option<String>,
    pub original_text: Option<String>,
    pub summary: Option<String>,
    pub conclusions: Option<SectionValue>,
    pub key_data: Option<SectionValue>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub id: i64,
    pub title: String,
    pub summary: String,
    pub created_at: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ReportPage {
    pub reports: Vec<ReportSummary>,
    pub pagination: Pagination,
}

// Section columns are TEXT. Native lists are stored as a JSON array and
// detected again on read; anything else is a plain string.
impl ToSql for SectionValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            SectionValue::Text(text) => Ok(ToSqlOutput::from(text.as_str())),
            SectionValue::Items(items) => {
                let encoded = serde_json::to_string(items)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
                Ok(ToSqlOutput::from(encoded))
            }
        }
    }
}

impl FromSql for SectionValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(SectionValue::Text(String::new())),
            _ => String::column_result(value).map(|text| decode_section(&text)),
        }
    }
}

fn decode_section(text: &str) -> SectionValue {
    if text.trim_start().starts_with('[') {
        if let Ok(items) = serde_json::from_str::<Vec<String>>(text) {
            return SectionValue::Items(items);
        }
    }
    SectionValue::Text(text.to_string())
}

const REPORT_COLUMNS: &str =
    "id, user_id, title, original_text, summary, conclusions, key_data, created_at, updated_at";

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<PersistedReport> {
    Ok(PersistedReport {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        original_text: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        summary: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        conclusions: row.get(5)?,
        key_data: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn fetch_report(conn: &Connection, user_id: &str, report_id: i64) -> rusqlite::Result<Option<PersistedReport>> {
    conn.query_row(
        &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?1 AND user_id = ?2"),
        params![report_id, user_id],
        report_from_row,
    )
    .optional()
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(path: &str) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.execute_batch("
            CREATE TABLE IF NOT EXISTS reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                original_text TEXT,
                summary TEXT,
                conclusions TEXT,
                key_data TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_reports_user_created ON reports(user_id, created_at);
        ")?;

        // Migration: early databases had no title column
        let has_title: bool = conn
            .prepare("SELECT COUNT(*) FROM pragma_table_info('reports') WHERE name='title'")
            .and_then(|mut s| s.query_row([], |r| r.get::<_, i64>(0)))
            .map(|c| c > 0)
            .unwrap_or(false);
        if !has_title {
            conn.execute_batch("ALTER TABLE reports ADD COLUMN title TEXT NOT NULL DEFAULT '';")?;
        }

        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create_report(&self, user_id: &str, report: &NewReport) -> Result<PersistedReport, rusqlite::Error> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        let title = report.title.trim();
        let summary = report.summary.trim();
        conn.execute(
            "INSERT INTO reports (user_id, title, original_text, summary, conclusions, key_data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![user_id, title, report.original_text, summary, report.conclusions, report.key_data, now, now],
        )?;
        let id = conn.last_insert_rowid();
        tracing::debug!(report_id = id, user_id, "inserted report");
        Ok(PersistedReport {
            id,
            user_id: user_id.to_string(),
            title: title.to_string(),
            original_text: report.original_text.clone(),
            summary: summary.to_string(),
            conclusions: report.conclusions.clone(),
            key_data: report.key_data.clone(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub fn get_report(&self, user_id: &str, report_id: i64) -> Result<Option<PersistedReport>, rusqlite::Error> {
        let conn = self.conn();
        fetch_report(&conn, user_id, report_id)
    }

    pub fn list_reports(&self, user_id: &str, query: &ListQuery) -> Result<ReportPage, rusqlite::Error> {
        let conn = self.conn();
        let pattern = query.like_pattern().unwrap_or_default();
        let filter_clause = "user_id = ?1 AND (?2 = '' OR title LIKE ?2 ESCAPE '\\' OR summary LIKE ?2 ESCAPE '\\')";

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM reports WHERE {filter_clause}"),
            params![user_id, pattern],
            |r| r.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT id, title, summary, created_at FROM reports WHERE {filter_clause} ORDER BY {} LIMIT ?3 OFFSET ?4",
            query.sort.order_by_sql()
        ))?;
        let offset = i64::try_from(query.offset()).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![user_id, pattern, query.limit, offset], |row| {
            Ok(ReportSummary {
                id: row.get(0)?,
                title: row.get(1)?,
                summary: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                created_at: row.get(3)?,
            })
        })?;
        let reports = rows.collect::<Result<Vec<_>, _>>()?;

        Ok(ReportPage {
            reports,
            pagination: Pagination {
                page: query.page,
                limit: query.limit,
                total: u64::try_from(total).unwrap_or(0),
            },
        })
    }

    pub fn update_report(
        &self,
        user_id: &str,
        report_id: i64,
        update: &ReportUpdate,
    ) -> Result<Option<PersistedReport>, rusqlite::Error> {
        let conn = self.conn();
        let Some(mut report) = fetch_report(&conn, user_id, report_id)? else {
            return Ok(None);
        };

        if let Some(title) = &update.title {
            report.title = title.trim().to_string();
        }
        if let Some(original_text) = &update.original_text {
            report.original_text = original_text.clone();
        }
        if let Some(summary) = &update.summary {
            report.summary = summary.trim().to_string();
        }
        if let Some(conclusions) = &update.conclusions {
            report.conclusions = conclusions.clone();
        }
        if let Some(key_data) = &update.key_data {
            report.key_data = key_data.clone();
        }
        report.updated_at = Utc::now().to_rfc3339();

        conn.execute(
            "UPDATE reports SET title = ?1, original_text = ?2, summary = ?3, conclusions = ?4, key_data = ?5, updated_at = ?6
             WHERE id = ?7 AND user_id = ?8",
            params![
                report.title,
                report.original_text,
                report.summary,
                report.conclusions,
                report.key_data,
                report.updated_at,
                report_id,
                user_id
            ],
        )?;
        tracing::debug!(report_id, user_id, "updated report");
        Ok(Some(report))
    }

    /// Returns whether a row owned by `user_id` was removed.
    pub fn delete_report(&self, user_id: &str, report_id: i64) -> Result<bool, rusqlite::Error> {
        let conn = self.conn();
        let removed = conn.execute(
            "DELETE FROM reports WHERE id = ?1 AND user_id = ?2",
            params![report_id, user_id],
        )?;
        tracing::debug!(report_id, user_id, removed, "deleted report");
        Ok(removed > 0)
    }
}
