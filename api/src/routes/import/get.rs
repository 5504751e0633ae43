//! Manual CSV import: read-only routes.

use axum::{Json, extract::State, http::StatusCode};

use crate::routes::user_mappings::unmapped_ids_from_audit;
use crate::{response::ApiResponse, state::AppState};

/// GET `/api/unmapped-staff-codes`
///
/// Staff codes seen in recently imported CSV exports that still have no
/// identity mapping. Aggregated from the audit trail of CSV-import runs.
///
/// **Auth**: any authenticated user.
pub async fn list_unmapped_staff_codes(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<Vec<i64>>>) {
    match unmapped_ids_from_audit(&state, &["csv_import"]).await {
        Ok(codes) => (
            StatusCode::OK,
            Json(ApiResponse::success(codes, "Unmapped staff codes retrieved")),
        ),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!(
                "Failed to retrieve unmapped staff codes: {err}"
            ))),
        ),
    }
}
