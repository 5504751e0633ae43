use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

mod get;
mod post;

pub use get::list_machines;
pub use post::{sync_machine, test_connection};

pub fn machines_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_machines))
        .route("/test-connection", post(test_connection))
        .route("/sync", post(sync_machine))
}
