use axum::{Router, extract::DefaultBodyLimit, routing::post};

use crate::state::AppState;

mod get;
mod post;

pub use get::list_unmapped_staff_codes;
pub use post::{MAX_UPLOAD_BYTES, import_csv};

pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(import_csv))
        // Multipart framing overhead on top of the file cap.
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024))
}
