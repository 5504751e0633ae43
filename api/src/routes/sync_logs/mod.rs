use axum::{Router, routing::get};

use crate::state::AppState;

mod get;

pub use get::list_sync_logs;

pub fn sync_logs_routes() -> Router<AppState> {
    Router::new().route("/", get(list_sync_logs))
}
