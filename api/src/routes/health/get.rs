use axum::{Json, http::StatusCode};

use crate::response::ApiResponse;

/// GET `/api/health`
///
/// Liveness probe. Public; no authentication required.
pub async fn health_check() -> (StatusCode, Json<ApiResponse<&'static str>>) {
    (
        StatusCode::OK,
        Json(ApiResponse::success("OK", "Health check passed")),
    )
}
