//! Machine registry: read-only routes.

use axum::{Json, extract::State, http::StatusCode};
use db::models::machine_config::{Column as MachineCol, Entity as MachineEntity, Model as Machine};
use sea_orm::{EntityTrait, QueryOrder};

use crate::{response::ApiResponse, state::AppState};

/// GET `/api/machines`
///
/// List every registered biometric terminal, enabled or not.
///
/// **Auth**: any authenticated user.
pub async fn list_machines(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<Vec<Machine>>>) {
    match MachineEntity::find()
        .order_by_asc(MachineCol::Id)
        .all(state.db())
        .await
    {
        Ok(machines) => (
            StatusCode::OK,
            Json(ApiResponse::success(machines, "Machines retrieved")),
        ),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!(
                "Failed to retrieve machines: {err}"
            ))),
        ),
    }
}
