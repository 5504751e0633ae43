use api::routes::routes;
use api::state::AppState;
use axum::Router;
use db::test_utils::setup_test_db;

/// Builds the full application router on a fresh in-memory database.
pub async fn make_test_app() -> (Router, AppState) {
    dotenvy::dotenv().expect("Failed to load .env");

    let db = setup_test_db().await;
    let state = AppState::new(db);
    let app = Router::new()
        .nest("/api", routes())
        .with_state(state.clone());
    (app, state)
}

pub async fn get_json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
