//! Identity mappings: read-only routes.

use std::collections::HashSet;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use db::models::{
    attendance_audit_log::Model as AuditLog,
    user_machine_mapping::{Model as Mapping, PersonType},
};
use serde::Deserialize;

use crate::{response::ApiResponse, state::AppState};

/// How far back in the audit trail to look for unmapped ids.
const AUDIT_LOOKBACK_ROWS: u64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub person_type: Option<PersonType>,
}

/// GET `/api/user-mappings`
///
/// List identity mappings, ordered by machine user id.
///
/// **Auth**: any authenticated user.
///
/// **Query**:
/// - `person_type` *(optional)*: `student` | `staff`
pub async fn list_user_mappings(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> (StatusCode, Json<ApiResponse<Vec<Mapping>>>) {
    match Mapping::list(state.db(), q.person_type).await {
        Ok(mappings) => (
            StatusCode::OK,
            Json(ApiResponse::success(mappings, "User mappings retrieved")),
        ),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!(
                "Failed to retrieve user mappings: {err}"
            ))),
        ),
    }
}

/// GET `/api/unmapped-users`
///
/// Machine user ids seen by the live devices or the legacy export during
/// recent sync runs but still not mapped to any person. Sourced from the
/// audit trail, so it only covers what recent runs actually encountered.
///
/// **Auth**: any authenticated user.
pub async fn list_unmapped_users(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<Vec<i64>>>) {
    match unmapped_ids_from_audit(&state, &["machine", "legacy_db"]).await {
        Ok(ids) => (
            StatusCode::OK,
            Json(ApiResponse::success(ids, "Unmapped machine user ids retrieved")),
        ),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!(
                "Failed to retrieve unmapped ids: {err}"
            ))),
        ),
    }
}

/// Collects distinct unmapped ids from recent audit rows for the given
/// sources, dropping any id that has been mapped since the run recorded it.
pub(crate) async fn unmapped_ids_from_audit(
    state: &AppState,
    sources: &[&str],
) -> Result<Vec<i64>, sea_orm::DbErr> {
    let audits = AuditLog::find_recent(state.db(), AUDIT_LOOKBACK_ROWS).await?;

    let mapped: HashSet<i64> = Mapping::list(state.db(), None)
        .await?
        .into_iter()
        .map(|m| m.machine_user_id)
        .collect();

    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for audit in audits {
        let source = audit.details["source"].as_str().unwrap_or_default();
        if !sources.contains(&source) {
            continue;
        }
        let Some(unmapped) = audit.details["unmapped_ids"].as_array() else {
            continue;
        };
        for id in unmapped.iter().filter_map(|v| v.as_i64()) {
            if !mapped.contains(&id) && seen.insert(id) {
                ids.push(id);
            }
        }
    }

    ids.sort_unstable();
    Ok(ids)
}
