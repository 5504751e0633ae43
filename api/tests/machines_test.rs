mod helpers;

use api::auth::generate_jwt;
use axum::{
    body::Body as AxumBody,
    http::{Request, StatusCode},
};
use db::models::{machine_config::Model as MachineModel, sync_log::Model as SyncLogModel};
use helpers::app::{get_json_body, make_test_app};
use serial_test::serial;
use tower::ServiceExt;

fn authed(token: &str, method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<AxumBody> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"));
    match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(AxumBody::from(body.to_string()))
            .unwrap(),
        None => builder.body(AxumBody::empty()).unwrap(),
    }
}

#[tokio::test]
#[serial]
async fn list_machines_returns_registered_terminals() {
    let (app, state) = make_test_app().await;
    let (token, _) = generate_jwt(1, false);

    MachineModel::create(state.db(), "Main Gate", "10.0.0.2", 4370, true)
        .await
        .unwrap();
    MachineModel::create(state.db(), "Staff Entrance", "10.0.0.3", 4370, false)
        .await
        .unwrap();

    let response = app
        .oneshot(authed(&token, "GET", "/api/machines", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_json_body(response).await;
    let machines = json["data"].as_array().unwrap();
    assert_eq!(machines.len(), 2);
    assert_eq!(machines[0]["name"], "Main Gate");
    assert_eq!(machines[1]["enabled"], false);
}

#[tokio::test]
#[serial]
async fn sync_of_unknown_machine_is_404() {
    let (app, _state) = make_test_app().await;
    let (token, _) = generate_jwt(1, false);

    let response = app
        .oneshot(authed(
            &token,
            "POST",
            "/api/machines/sync",
            Some(serde_json::json!({ "machine_id": 999 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = get_json_body(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["data"]["failure"], "machine_not_found");
}

#[tokio::test]
#[serial]
async fn sync_of_disabled_machine_is_400() {
    let (app, state) = make_test_app().await;
    let (token, _) = generate_jwt(1, false);

    let machine = MachineModel::create(state.db(), "Mothballed", "10.0.0.9", 4370, false)
        .await
        .unwrap();

    let response = app
        .oneshot(authed(
            &token,
            "POST",
            "/api/machines/sync",
            Some(serde_json::json!({ "machine_id": machine.id })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = get_json_body(response).await;
    assert!(json["message"].as_str().unwrap().contains("disabled"));
    assert_eq!(json["data"]["failure"], "machine_disabled");
}

#[tokio::test]
#[serial]
async fn status_comes_from_the_failure_kind_not_the_message_text() {
    let (app, state) = make_test_app().await;
    let (token, _) = generate_jwt(1, false);

    // A machine name that smuggles "not found" into the failure message
    // must still report the disabled state, not a 404.
    let machine = MachineModel::create(state.db(), "not found annex", "10.0.0.9", 4370, false)
        .await
        .unwrap();

    let response = app
        .oneshot(authed(
            &token,
            "POST",
            "/api/machines/sync",
            Some(serde_json::json!({ "machine_id": machine.id })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = get_json_body(response).await;
    assert!(json["message"].as_str().unwrap().contains("not found"));
    assert_eq!(json["data"]["failure"], "machine_disabled");
}

#[tokio::test]
#[serial]
async fn failed_probe_is_a_gateway_error_and_writes_no_log() {
    let (app, state) = make_test_app().await;
    let (token, _) = generate_jwt(1, false);

    // Bind-then-drop guarantees a closed port.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let machine = MachineModel::create(state.db(), "Offline", "127.0.0.1", i32::from(port), true)
        .await
        .unwrap();

    let response = app
        .oneshot(authed(
            &token,
            "POST",
            "/api/machines/test-connection",
            Some(serde_json::json!({ "machine_id": machine.id })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let json = get_json_body(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["data"]["failure"], "device");
    assert!(json["data"]["machine_info"].is_null());

    let logs = SyncLogModel::find_recent(state.db(), None, 10).await.unwrap();
    assert!(logs.is_empty());
}
