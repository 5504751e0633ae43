use axum::{Router, routing::get};

use crate::state::AppState;

mod get;

pub use get::health_check;

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}
