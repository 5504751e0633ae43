mod helpers;

use api::auth::generate_jwt;
use axum::{
    body::Body as AxumBody,
    http::{Request, StatusCode},
};
use db::models::{
    attendance_audit_log::Model as AuditModel,
    user_machine_mapping::{Model as MappingModel, PersonType},
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
async fn unmapped_users_come_from_device_and_legacy_runs_only() {
    let (app, state) = make_test_app().await;
    let (token, _) = generate_jwt(1, false);

    AuditModel::record(
        state.db(),
        "machine_sync",
        "system",
        serde_json::json!({ "source": "machine", "unmapped_ids": [99, 55] }),
    )
    .await
    .unwrap();
    AuditModel::record(
        state.db(),
        "machine_sync",
        "system",
        serde_json::json!({ "source": "legacy_db", "unmapped_ids": [55, 12] }),
    )
    .await
    .unwrap();
    // CSV runs feed the staff-code endpoint, not this one.
    AuditModel::record(
        state.db(),
        "machine_sync",
        "system",
        serde_json::json!({ "source": "csv_import", "unmapped_ids": [400] }),
    )
    .await
    .unwrap();

    let response = app.oneshot(get(&token, "/api/unmapped-users")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_json_body(response).await;
    assert_eq!(json["data"], serde_json::json!([12, 55, 99]));
}

#[tokio::test]
#[serial]
async fn ids_mapped_since_the_run_are_dropped() {
    let (app, state) = make_test_app().await;
    let (token, _) = generate_jwt(1, false);

    AuditModel::record(
        state.db(),
        "machine_sync",
        "system",
        serde_json::json!({ "source": "machine", "unmapped_ids": [99, 55] }),
    )
    .await
    .unwrap();
    MappingModel::create_or_update(state.db(), 10, PersonType::Student, 99)
        .await
        .unwrap();

    let response = app.oneshot(get(&token, "/api/unmapped-users")).await.unwrap();
    let json = get_json_body(response).await;
    assert_eq!(json["data"], serde_json::json!([55]));
}

#[tokio::test]
#[serial]
async fn unmapped_staff_codes_come_from_csv_runs() {
    let (app, state) = make_test_app().await;
    let (token, _) = generate_jwt(1, false);

    AuditModel::record(
        state.db(),
        "machine_sync",
        "system",
        serde_json::json!({ "source": "csv_import", "unmapped_ids": [400, 401] }),
    )
    .await
    .unwrap();
    AuditModel::record(
        state.db(),
        "machine_sync",
        "system",
        serde_json::json!({ "source": "machine", "unmapped_ids": [99] }),
    )
    .await
    .unwrap();

    let response = app
        .oneshot(get(&token, "/api/unmapped-staff-codes"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_json_body(response).await;
    assert_eq!(json["data"], serde_json::json!([400, 401]));
}
