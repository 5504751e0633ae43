mod helpers;

use api::auth::generate_jwt;
use axum::{
    body::Body as AxumBody,
    http::{Request, StatusCode},
};
use chrono::Utc;
use db::models::{
    machine_config::Model as MachineModel,
    sync_log::{Model as SyncLogModel, SyncStatus},
};
use helpers::app::{get_json_body, make_test_app};
use serial_test::serial;
use tower::ServiceExt;

fn get(token: &str, uri: &str) -> Request<AxumBody> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(AxumBody::empty())
        .unwrap()
}

#[tokio::test]
#[serial]
async fn sync_logs_are_joined_with_machine_names_newest_first() {
    let (app, state) = make_test_app().await;
    let (token, _) = generate_jwt(1, false);

    let machine = MachineModel::create(state.db(), "Main Gate", "10.0.0.2", 4370, true)
        .await
        .unwrap();

    let older = SyncLogModel::start(state.db(), machine.id, Utc::now() - chrono::Duration::minutes(5))
        .await
        .unwrap();
    SyncLogModel::complete(state.db(), older.id, SyncStatus::Failed, 0, 0, Some("timeout".into()))
        .await
        .unwrap();

    let newer = SyncLogModel::start(state.db(), machine.id, Utc::now()).await.unwrap();
    SyncLogModel::complete(state.db(), newer.id, SyncStatus::Success, 12, 9, None)
        .await
        .unwrap();

    let response = app.oneshot(get(&token, "/api/sync-logs")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_json_body(response).await;
    let logs = json["data"].as_array().unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0]["status"], "success");
    assert_eq!(logs[0]["records_saved"], 9);
    assert_eq!(logs[0]["machine_name"], "Main Gate");
    assert_eq!(logs[1]["status"], "failed");
    assert_eq!(logs[1]["error_message"], "timeout");
}

#[tokio::test]
#[serial]
async fn sync_logs_can_be_scoped_and_limited() {
    let (app, state) = make_test_app().await;
    let (token, _) = generate_jwt(1, false);

    let gate = MachineModel::create(state.db(), "Main Gate", "10.0.0.2", 4370, true)
        .await
        .unwrap();
    let office = MachineModel::create(state.db(), "Office", "10.0.0.3", 4370, true)
        .await
        .unwrap();

    for machine_id in [gate.id, gate.id, office.id] {
        let log = SyncLogModel::start(state.db(), machine_id, Utc::now()).await.unwrap();
        SyncLogModel::complete(state.db(), log.id, SyncStatus::Success, 1, 1, None)
            .await
            .unwrap();
    }

    let uri = format!("/api/sync-logs?machine_id={}", gate.id);
    let response = app.clone().oneshot(get(&token, &uri)).await.unwrap();
    let json = get_json_body(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);

    let response = app.oneshot(get(&token, "/api/sync-logs?limit=1")).await.unwrap();
    let json = get_json_body(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}
