//! Machine registry: connection probe and manual sync trigger.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use services::machine_sync::{ConnectionReport, SyncFailureKind, SyncReport};

use crate::{response::ApiResponse, state::AppState};

#[derive(Debug, Deserialize)]
pub struct MachineRequest {
    pub machine_id: i64,
}

/// POST `/api/machines/test-connection`
///
/// Read-only reachability probe against one terminal. Nothing is persisted;
/// a failed probe leaves no sync log entry.
///
/// **Auth**: any authenticated user.
pub async fn test_connection(
    State(state): State<AppState>,
    Json(req): Json<MachineRequest>,
) -> (StatusCode, Json<ApiResponse<ConnectionReport>>) {
    let report = state.sync().test_connection(state.db(), req.machine_id).await;
    respond(report.failure, report.message.clone(), report)
}

/// POST `/api/machines/sync`
///
/// Run one full sync for a terminal now. The run itself is serialized per
/// machine; a second request while one is in flight gets `409`.
///
/// **Auth**: any authenticated user.
pub async fn sync_machine(
    State(state): State<AppState>,
    Json(req): Json<MachineRequest>,
) -> (StatusCode, Json<ApiResponse<SyncReport>>) {
    let report = state.sync().sync_machine(state.db(), req.machine_id).await;
    respond(report.failure, report.message.clone(), report)
}

/// A failed run still returns its full report; only the envelope flag and
/// the status code vary with the failure kind.
fn respond<T: Serialize>(
    failure: Option<SyncFailureKind>,
    message: String,
    report: T,
) -> (StatusCode, Json<ApiResponse<T>>) {
    let status = match failure {
        None => StatusCode::OK,
        Some(SyncFailureKind::MachineNotFound) => StatusCode::NOT_FOUND,
        Some(SyncFailureKind::MachineDisabled) => StatusCode::BAD_REQUEST,
        Some(SyncFailureKind::SyncInProgress) => StatusCode::CONFLICT,
        // Reachability and protocol failures with the device itself.
        Some(SyncFailureKind::Device) => StatusCode::BAD_GATEWAY,
        Some(SyncFailureKind::Database) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ApiResponse {
            success: failure.is_none(),
            data: report,
            message,
        }),
    )
}
