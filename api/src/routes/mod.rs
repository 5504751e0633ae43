//! HTTP route entry point for `/api/...`.
//!
//! Routes are organized by domain, each file split by HTTP verb. Everything
//! except `/health` sits behind the bearer-token guard.
//!
//! Route groups:
//! - `/health` → liveness probe (public)
//! - `/machines` → terminal registry, connection probe, manual sync
//! - `/sync-logs` → per-machine sync history
//! - `/user-mappings` → machine-id-to-person identity mappings
//! - `/unmapped-users` → ids recent device/legacy runs could not resolve
//! - `/import-csv` → manual CSV export upload
//! - `/unmapped-staff-codes` → staff codes recent CSV imports could not resolve

use axum::{Router, middleware::from_fn, routing::get};

use crate::auth::guards::allow_authenticated;
use crate::state::AppState;

pub mod health;
pub mod import;
pub mod machines;
pub mod sync_logs;
pub mod user_mappings;

/// Builds the complete application router for all HTTP endpoints.
///
/// The returned router has `AppState` as its state type and mounts all
/// routes under their respective base paths.
pub fn routes() -> Router<AppState> {
    let protected = Router::new()
        .nest("/machines", machines::machines_routes())
        .nest("/sync-logs", sync_logs::sync_logs_routes())
        .nest("/user-mappings", user_mappings::user_mappings_routes())
        .route("/unmapped-users", get(user_mappings::list_unmapped_users))
        .nest("/import-csv", import::import_routes())
        .route(
            "/unmapped-staff-codes",
            get(import::list_unmapped_staff_codes),
        )
        .route_layer(from_fn(allow_authenticated));

    Router::new()
        .nest("/health", health::health_routes())
        .merge(protected)
}
