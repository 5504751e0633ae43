//! Sync history: read-only routes.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use db::models::sync_log::{Model as SyncLog, SyncStatus};
use serde::{Deserialize, Serialize};

use crate::{response::ApiResponse, state::AppState};

const DEFAULT_LIMIT: u64 = 50;
const MAX_LIMIT: u64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub machine_id: Option<i64>,
    pub limit: Option<u64>,
}

/// One attempt, joined with the machine's display name.
#[derive(Debug, Serialize)]
pub struct SyncLogResponse {
    pub id: i64,
    pub machine_id: i64,
    pub machine_name: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: SyncStatus,
    pub records_retrieved: i32,
    pub records_saved: i32,
    pub error_message: Option<String>,
}

/// GET `/api/sync-logs`
///
/// Most recent sync attempts first, across all machines.
///
/// **Auth**: any authenticated user.
///
/// **Query**:
/// - `machine_id` *(optional)*: scope to one machine
/// - `limit` *(default 50, max 500)*
pub async fn list_sync_logs(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> (StatusCode, Json<ApiResponse<Vec<SyncLogResponse>>>) {
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    match SyncLog::find_recent(state.db(), q.machine_id, limit).await {
        Ok(rows) => {
            let logs = rows
                .into_iter()
                .map(|(log, machine)| SyncLogResponse {
                    id: log.id,
                    machine_id: log.machine_id,
                    machine_name: machine.map(|m| m.name),
                    started_at: log.started_at,
                    completed_at: log.completed_at,
                    status: log.status,
                    records_retrieved: log.records_retrieved,
                    records_saved: log.records_saved,
                    error_message: log.error_message,
                })
                .collect();
            (
                StatusCode::OK,
                Json(ApiResponse::success(logs, "Sync logs retrieved")),
            )
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!(
                "Failed to retrieve sync logs: {err}"
            ))),
        ),
    }
}
