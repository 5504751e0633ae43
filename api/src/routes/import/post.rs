//! Manual CSV import: multipart upload endpoint.

use std::path::Path;

use axum::{Json, extract::Multipart, extract::State, http::StatusCode};
use chrono::Utc;
use services::csv_import::{self, CsvImportReport};
use tracing::warn;
use util::config;

use crate::{response::ApiResponse, state::AppState};

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const UPLOAD_FIELD: &str = "csv_file";

/// POST `/api/import-csv`
///
/// Upload one vendor CSV export and import it immediately. The file goes
/// through the staging directory and is deleted once the run finishes,
/// whatever the outcome.
///
/// **Auth**: any authenticated user.
///
/// **Body**: multipart, field `csv_file`, `.csv` only, at most 5 MB.
pub async fn import_csv(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> (StatusCode, Json<ApiResponse<CsvImportReport>>) {
    let (file_name, data) = loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                return reject(
                    StatusCode::BAD_REQUEST,
                    format!("Multipart field {UPLOAD_FIELD:?} is required"),
                );
            }
            Err(err) => {
                return reject(
                    StatusCode::BAD_REQUEST,
                    format!("Malformed multipart body: {err}"),
                );
            }
        };

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = match field.file_name().map(sanitize_file_name) {
            Some(Some(name)) => name,
            _ => {
                return reject(
                    StatusCode::BAD_REQUEST,
                    "Uploaded file must have a file name",
                );
            }
        };

        match field.bytes().await {
            Ok(data) => break (file_name, data),
            Err(err) => {
                return reject(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    format!("Could not read upload: {err}"),
                );
            }
        }
    };

    if !file_name.to_ascii_lowercase().ends_with(".csv") {
        return reject(StatusCode::BAD_REQUEST, "Only .csv files are accepted");
    }
    if data.len() > MAX_UPLOAD_BYTES {
        return reject(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Uploaded file exceeds the 5 MB limit",
        );
    }

    // Stage under a per-upload directory so concurrent uploads of the same
    // file name cannot clobber each other.
    let staging_dir = Path::new(&config::csv_upload_dir())
        .join(format!("{}", Utc::now().timestamp_nanos_opt().unwrap_or_default()));
    if let Err(err) = tokio::fs::create_dir_all(&staging_dir).await {
        return reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Could not stage upload: {err}"),
        );
    }
    let staged_path = staging_dir.join(&file_name);
    if let Err(err) = tokio::fs::write(&staged_path, &data).await {
        return reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Could not stage upload: {err}"),
        );
    }

    let report = csv_import::import_file(state.db(), &staged_path).await;

    if let Err(err) = tokio::fs::remove_dir(&staging_dir).await {
        warn!(dir = %staging_dir.display(), %err, "failed to remove staging directory");
    }

    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    let message = report.message.clone();
    (
        status,
        Json(ApiResponse {
            success: report.success,
            data: report,
            message,
        }),
    )
}

fn reject(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ApiResponse<CsvImportReport>>) {
    (status, Json(ApiResponse::error(message)))
}

/// Strips any path components an uploading client may have left in.
fn sanitize_file_name(raw: &str) -> Option<String> {
    Path::new(raw)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
}
