use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

mod get;
mod post;

pub use get::{list_unmapped_users, list_user_mappings};
pub(crate) use get::unmapped_ids_from_audit;
pub use post::create_user_mapping;

pub fn user_mappings_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_user_mappings))
        .route("/", post(create_user_mapping))
}
