//! Identity mappings: create and re-point.

use axum::{Json, extract::State, http::StatusCode};
use db::models::user_machine_mapping::{Model as Mapping, PersonType};
use serde::Deserialize;
use tracing::info;

use crate::{response::ApiResponse, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateMappingRequest {
    pub person_id: i64,
    pub person_type: PersonType,
    pub machine_user_id: i64,
}

/// POST `/api/user-mappings`
///
/// Bind a machine user id to a person. Re-posting for the same person
/// re-points their mapping; a machine user id already bound to a
/// *different* person is rejected with `409` and the existing row is left
/// untouched.
///
/// **Auth**: any authenticated user.
pub async fn create_user_mapping(
    State(state): State<AppState>,
    Json(req): Json<CreateMappingRequest>,
) -> (StatusCode, Json<ApiResponse<Option<Mapping>>>) {
    let existing = match Mapping::find_by_machine_user_id(state.db(), req.machine_user_id).await {
        Ok(existing) => existing,
        Err(err) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(format!(
                    "Failed to check existing mappings: {err}"
                ))),
            );
        }
    };

    if let Some(other) = existing {
        if other.person_id != req.person_id || other.person_type != req.person_type {
            return (
                StatusCode::CONFLICT,
                Json(ApiResponse::error(format!(
                    "Machine user ID {} is already mapped to {} {}",
                    req.machine_user_id, other.person_type, other.person_id
                ))),
            );
        }
    }

    match Mapping::create_or_update(
        state.db(),
        req.person_id,
        req.person_type,
        req.machine_user_id,
    )
    .await
    {
        Ok(mapping) => {
            info!(
                person_id = mapping.person_id,
                person_type = %mapping.person_type,
                machine_user_id = mapping.machine_user_id,
                "user mapping saved"
            );
            (
                StatusCode::OK,
                Json(ApiResponse::success(Some(mapping), "User mapping saved")),
            )
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!(
                "Failed to save user mapping: {err}"
            ))),
        ),
    }
}
