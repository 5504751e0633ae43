//! Parser and one-shot import run for the vendor's wide-format CSV export:
//! one row per person per day, identified by a legacy staff code, with up to
//! twelve punch-time columns.
//!
//! Only the first non-blank time column becomes an event. Later punches on
//! the same day (check-out, lunch, etc.) are deliberately not modeled by
//! this importer, unlike the live-device and legacy-export paths which keep
//! every punch. Operators importing historical CSVs accept that loss.

use std::collections::HashMap;
use std::path::Path;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use sea_orm::DatabaseConnection;
use tracing::{info, warn};

use crate::audit;
use crate::reconcile::{self, EventSource, RawAttendanceEvent};

const TIME_COLUMN_COUNT: usize = 12;

/// Columns the header row must carry, bit-exact.
pub const REQUIRED_HEADERS: &[&str] = &["Department", "Name", "Staff Code", "Date", "Week"];

const DATE_FORMAT: &str = "%m/%d/%Y";
const TIME_FORMAT: &str = "%H:%M";

/// Raw parse result, before identity resolution.
#[derive(Debug, Clone, Default)]
pub struct CsvParseOutcome {
    pub events: Vec<RawAttendanceEvent>,
    /// Rows with a usable staff code and date. Rows missing either are
    /// silently skipped — malformed trailing rows are common in this export.
    pub records_processed: usize,
    pub errors: Vec<String>,
}

/// Full result of one import run, returned to the uploading operator.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CsvImportReport {
    pub success: bool,
    pub message: String,
    pub records_processed: usize,
    pub records_saved: usize,
    pub unmapped_staff_codes: Vec<i64>,
    pub errors: Vec<String>,
}

/// Parses the export into discrete check-in events.
///
/// Fails only when the header row does not match the contract; row-level
/// problems are collected into `errors` and parsing continues.
pub fn parse_export(content: &str) -> Result<CsvParseOutcome, String> {
    let mut lines = content.lines().enumerate();

    let (_, header_line) = lines
        .find(|(_, l)| !l.trim().is_empty())
        .ok_or_else(|| "CSV file is empty".to_owned())?;
    let columns = resolve_columns(header_line)?;

    let mut outcome = CsvParseOutcome::default();

    for (line_no, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();

        let staff_code = field(&fields, columns.staff_code);
        let date_text = field(&fields, columns.date);
        if staff_code.is_empty() || date_text.is_empty() {
            // Not counted as processed and not an error, per the row
            // acceptance rule.
            continue;
        }
        outcome.records_processed += 1;

        let machine_user_id = match staff_code.parse::<i64>() {
            Ok(code) => code,
            Err(_) => {
                outcome.errors.push(format!(
                    "line {}: staff code {:?} is not numeric",
                    line_no + 1,
                    staff_code
                ));
                continue;
            }
        };

        let date = match NaiveDate::parse_from_str(date_text, DATE_FORMAT) {
            Ok(date) => date,
            Err(_) => {
                outcome.errors.push(format!(
                    "line {}: malformed date {:?}",
                    line_no + 1,
                    date_text
                ));
                continue;
            }
        };

        // First non-blank punch wins; the rest of the row is ignored.
        let Some(time_text) = columns
            .times
            .iter()
            .map(|&idx| field(&fields, idx))
            .find(|t| !t.is_empty())
        else {
            continue; // a day row with no punches at all
        };

        match NaiveTime::parse_from_str(time_text, TIME_FORMAT) {
            Ok(time) => outcome.events.push(RawAttendanceEvent {
                machine_user_id,
                timestamp: Utc.from_utc_datetime(&date.and_time(time)),
            }),
            Err(_) => {
                outcome.errors.push(format!(
                    "line {}: malformed time {:?}",
                    line_no + 1,
                    time_text
                ));
            }
        }
    }

    Ok(outcome)
}

struct ColumnIndexes {
    staff_code: usize,
    date: usize,
    times: Vec<usize>,
}

fn resolve_columns(header_line: &str) -> Result<ColumnIndexes, String> {
    let headers: Vec<&str> = header_line.split(',').map(str::trim).collect();
    let index: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (*h, i))
        .collect();

    for required in REQUIRED_HEADERS {
        if !index.contains_key(required) {
            return Err(format!("CSV header is missing the {required:?} column"));
        }
    }

    let mut times = Vec::with_capacity(TIME_COLUMN_COUNT);
    for n in 1..=TIME_COLUMN_COUNT {
        let name = format!("Time{n}");
        let Some(&idx) = index.get(name.as_str()) else {
            return Err(format!("CSV header is missing the {name:?} column"));
        };
        times.push(idx);
    }

    Ok(ColumnIndexes {
        staff_code: index["Staff Code"],
        date: index["Date"],
        times,
    })
}

fn field<'a>(fields: &[&'a str], idx: usize) -> &'a str {
    fields.get(idx).copied().unwrap_or("")
}

/// Runs a full import for one uploaded file: parse, reconcile, audit.
///
/// The file is a temporary upload and is deleted afterwards regardless of
/// success or failure.
pub async fn import_file(db: &DatabaseConnection, path: &Path) -> CsvImportReport {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let report = import_file_inner(db, path, &file_name).await;

    if let Err(err) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), %err, "failed to remove uploaded CSV");
    }

    report
}

async fn import_file_inner(
    db: &DatabaseConnection,
    path: &Path,
    file_name: &str,
) -> CsvImportReport {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) => {
            return CsvImportReport {
                success: false,
                message: format!("Could not read uploaded file: {err}"),
                ..Default::default()
            };
        }
    };

    let parsed = match parse_export(&content) {
        Ok(parsed) => parsed,
        Err(message) => {
            return CsvImportReport {
                success: false,
                message,
                ..Default::default()
            };
        }
    };

    let source = EventSource::CsvImport {
        file: file_name.to_owned(),
    };

    let outcome = match reconcile::reconcile(db, &parsed.events, &source).await {
        Ok(outcome) => outcome,
        Err(err) => {
            return CsvImportReport {
                success: false,
                message: format!("Import failed: {err}"),
                records_processed: parsed.records_processed,
                errors: parsed.errors,
                ..Default::default()
            };
        }
    };

    let mut errors = parsed.errors;
    errors.extend(outcome.errors.iter().cloned());

    audit::record_run(
        db,
        &source,
        &outcome,
        serde_json::json!({ "file": file_name, "row_errors": errors.len() }),
    )
    .await;

    info!(
        file = file_name,
        processed = parsed.records_processed,
        saved = outcome.records_saved,
        unmapped = outcome.unmapped_ids.len(),
        "CSV import complete"
    );

    CsvImportReport {
        success: true,
        message: format!(
            "Imported {} of {} rows ({} unmapped staff codes)",
            outcome.records_saved,
            parsed.records_processed,
            outcome.unmapped_ids.len()
        ),
        records_processed: parsed.records_processed,
        records_saved: outcome.records_saved,
        unmapped_staff_codes: outcome.unmapped_ids,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> String {
        let times: Vec<String> = (1..=12).map(|n| format!("Time{n}")).collect();
        format!("Department, Name, Staff Code, Date, Week, {}", times.join(", "))
    }

    #[test]
    fn first_nonblank_time_wins() {
        let csv = format!(
            "{}\nMaths, Jane, 42, 1/10/2025, Fri, , 08:15, 12:30, , , , , , , , ,\n",
            header()
        );
        let parsed = parse_export(&csv).unwrap();
        assert_eq!(parsed.records_processed, 1);
        assert_eq!(parsed.events.len(), 1);
        assert_eq!(parsed.events[0].machine_user_id, 42);
        assert_eq!(
            parsed.events[0].timestamp.to_rfc3339(),
            "2025-01-10T08:15:00+00:00"
        );
    }

    #[test]
    fn rows_missing_staff_code_or_date_are_skipped_silently() {
        let csv = format!(
            "{}\nMaths, Jane, , 1/10/2025, Fri, 08:15, , , , , , , , , , ,\n\
             Maths, Joe, 43, , Fri, 08:20, , , , , , , , , , ,\n",
            header()
        );
        let parsed = parse_export(&csv).unwrap();
        assert_eq!(parsed.records_processed, 0);
        assert!(parsed.events.is_empty());
        assert!(parsed.errors.is_empty());
    }

    #[test]
    fn malformed_date_is_a_row_error() {
        let csv = format!(
            "{}\nMaths, Jane, 42, 2025-01-10, Fri, 08:15, , , , , , , , , , ,\n",
            header()
        );
        let parsed = parse_export(&csv).unwrap();
        assert_eq!(parsed.records_processed, 1);
        assert!(parsed.events.is_empty());
        assert_eq!(parsed.errors.len(), 1);
    }

    #[test]
    fn missing_header_column_fails_the_whole_file() {
        let csv = "Department, Name, Date, Week\nMaths, Jane, 1/10/2025, Fri\n";
        assert!(parse_export(csv).is_err());
    }

    #[test]
    fn day_row_with_no_punches_is_processed_but_yields_no_event() {
        let csv = format!(
            "{}\nMaths, Jane, 42, 1/10/2025, Fri, , , , , , , , , , , ,\n",
            header()
        );
        let parsed = parse_export(&csv).unwrap();
        assert_eq!(parsed.records_processed, 1);
        assert!(parsed.events.is_empty());
        assert!(parsed.errors.is_empty());
    }
}
