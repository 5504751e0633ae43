//! Reader for the second vendor's attendance export, a table-oriented
//! database file the vendor's own software keeps open and occasionally locks.
//!
//! Nothing about the file is contractually fixed between vendor versions:
//! the attendance table and its columns are resolved by probing ordered
//! candidate-name lists, first match wins. A failed read is a structured
//! result carrying the tables actually present, so an operator can extend
//! the lists instead of spelunking.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, QueryResult, Statement};
use tracing::{debug, info};

use crate::error::LegacyReadError;
use crate::reconcile::RawAttendanceEvent;

/// Known attendance table names across vendor versions, in probe order.
pub const CANDIDATE_TABLES: &[&str] = &[
    "CHECKINOUT",
    "TimeRecords1",
    "TimeRecords2",
    "att_log",
    "AttLog",
    "Attendance",
];

/// Candidate names for the identity column, in probe order.
const USER_ID_COLUMNS: &[&str] = &["emp_id", "card_id", "USERID", "user_id", "EnrollNumber"];

/// Candidate names for a combined date+time column, in probe order. Tried
/// after the split `sign_date` + `sign_timestring` pair.
const DATETIME_COLUMNS: &[&str] = &["CHECKTIME", "punch_time", "RecordTime", "checktime"];

const SIGN_DATE_COLUMN: &str = "sign_date";
const SIGN_TIME_COLUMN: &str = "sign_timestring";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

/// One successful whole-table read.
#[derive(Debug, Clone)]
pub struct LegacyReadOutcome {
    /// The candidate table name that matched.
    pub table: String,
    pub events: Vec<RawAttendanceEvent>,
    /// Rows where no candidate column yielded a usable id or timestamp.
    pub row_errors: Vec<String>,
}

/// Reads the vendor export file at a fixed path.
///
/// The file has no durable cursor, so every call loads the entire table;
/// the caller filters to events newer than its own sync watermark.
#[derive(Debug, Clone)]
pub struct LegacyExportReader {
    path: PathBuf,
}

impl LegacyExportReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read_events(&self) -> Result<LegacyReadOutcome, LegacyReadError> {
        if !self.path.exists() {
            return Err(LegacyReadError::new(
                format!("legacy export file not found: {}", self.path.display()),
                vec![],
            ));
        }

        // Read-only so a lock held by the vendor app fails loudly instead of
        // wedging their writer.
        let url = format!("sqlite://{}?mode=ro", self.path.display());
        let db = Database::connect(&url).await.map_err(|err| {
            LegacyReadError::new(
                format!("could not open legacy export file: {err}"),
                vec![],
            )
        })?;

        let available = list_tables(&db).await?;
        let Some(table) = resolve_table(&available) else {
            return Err(LegacyReadError::new(
                format!(
                    "no known attendance table found (candidates: {})",
                    CANDIDATE_TABLES.join(", ")
                ),
                available,
            ));
        };
        debug!(table, "resolved legacy attendance table");

        let rows = db
            .query_all(Statement::from_string(
                DatabaseBackend::Sqlite,
                format!("SELECT * FROM \"{table}\""),
            ))
            .await
            .map_err(|err| {
                LegacyReadError::new(
                    format!("failed to read table {table}: {err}"),
                    available.clone(),
                )
            })?;

        let mut events = Vec::with_capacity(rows.len());
        let mut row_errors = Vec::new();

        for (idx, row) in rows.iter().enumerate() {
            let Some(machine_user_id) = extract_user_id(row) else {
                row_errors.push(format!("row {}: no usable identity column", idx + 1));
                continue;
            };
            let Some(naive) = extract_timestamp(row) else {
                row_errors.push(format!("row {}: no usable timestamp column", idx + 1));
                continue;
            };
            events.push(RawAttendanceEvent {
                machine_user_id,
                timestamp: Utc.from_utc_datetime(&naive),
            });
        }

        info!(
            table,
            events = events.len(),
            row_errors = row_errors.len(),
            "legacy export read complete"
        );

        Ok(LegacyReadOutcome {
            table,
            events,
            row_errors,
        })
    }
}

async fn list_tables(
    db: &sea_orm::DatabaseConnection,
) -> Result<Vec<String>, LegacyReadError> {
    let rows = db
        .query_all(Statement::from_string(
            DatabaseBackend::Sqlite,
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        ))
        .await
        .map_err(|err| {
            LegacyReadError::new(format!("could not enumerate tables: {err}"), vec![])
        })?;

    let mut names = Vec::with_capacity(rows.len());
    for row in rows {
        if let Ok(name) = row.try_get::<String>("", "name") {
            names.push(name);
        }
    }
    Ok(names)
}

/// First candidate present in the file wins. Comparison is
/// case-insensitive because the legacy engine's catalog is.
fn resolve_table(available: &[String]) -> Option<String> {
    for candidate in CANDIDATE_TABLES {
        if let Some(name) = available
            .iter()
            .find(|t| t.eq_ignore_ascii_case(candidate))
        {
            return Some(name.clone());
        }
    }
    None
}

fn extract_user_id(row: &QueryResult) -> Option<i64> {
    for column in USER_ID_COLUMNS {
        if let Ok(id) = row.try_get::<i64>("", column) {
            return Some(id);
        }
        if let Ok(text) = row.try_get::<String>("", column) {
            if let Ok(id) = text.trim().parse::<i64>() {
                return Some(id);
            }
        }
    }
    None
}

/// The split `sign_date` + `sign_timestring` pair is tried first, then each
/// combined-datetime candidate. The first successfully parsed value wins.
fn extract_timestamp(row: &QueryResult) -> Option<NaiveDateTime> {
    if let (Ok(date_text), Ok(time_text)) = (
        row.try_get::<String>("", SIGN_DATE_COLUMN),
        row.try_get::<String>("", SIGN_TIME_COLUMN),
    ) {
        if let (Some(date), Some(time)) =
            (parse_date_text(&date_text), parse_time_text(&time_text))
        {
            return Some(date.and_time(time));
        }
    }

    for column in DATETIME_COLUMNS {
        if let Ok(text) = row.try_get::<String>("", column) {
            if let Some(dt) = parse_datetime_text(&text) {
                return Some(dt);
            }
        }
        if let Ok(dt) = row.try_get::<NaiveDateTime>("", column) {
            return Some(dt);
        }
    }
    None
}

fn parse_datetime_text(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

fn parse_time_text(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_resolution_prefers_candidate_order() {
        let available = vec!["TimeRecords2".to_owned(), "CHECKINOUT".to_owned()];
        assert_eq!(resolve_table(&available).as_deref(), Some("CHECKINOUT"));
    }

    #[test]
    fn table_resolution_is_case_insensitive() {
        let available = vec!["checkinout".to_owned()];
        assert_eq!(resolve_table(&available).as_deref(), Some("checkinout"));
    }

    #[test]
    fn datetime_text_formats() {
        assert!(parse_datetime_text("2025-01-10 08:05:00").is_some());
        assert!(parse_datetime_text("1/10/2025 08:05").is_some());
        assert!(parse_datetime_text("not a date").is_none());
    }
}
