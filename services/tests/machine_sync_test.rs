mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use db::models::{
    attendance_audit_log::Model as AuditModel,
    dual_mode_attendance::Model as AttendanceModel,
    machine_config::{Entity as MachineEntity, Model as MachineModel},
    sync_log::{Model as SyncLogModel, SyncStatus},
    user_machine_mapping::{Model as MappingModel, PersonType},
};
use db::test_utils::setup_test_db;
use sea_orm::EntityTrait;
use services::device::DeviceClient;
use services::machine_sync::MachineSyncService;

use common::{closed_port_addr, spawn_fake_device};

const PUNCH_SECS: i64 = 1736496300; // 2025-01-10T08:05:00Z

fn fast_service() -> MachineSyncService {
    MachineSyncService::new(DeviceClient::new().with_retry_base_delay(Duration::from_millis(10)))
}

#[tokio::test]
async fn first_sync_end_to_end() {
    let db = setup_test_db().await;
    let device = spawn_fake_device(vec![(7, PUNCH_SECS)], Duration::ZERO).await;
    let machine = MachineModel::create(
        &db,
        "Gate A",
        &device.addr.ip().to_string(),
        i32::from(device.addr.port()),
        true,
    )
    .await
    .unwrap();
    MappingModel::create_or_update(&db, 100, PersonType::Student, 7)
        .await
        .unwrap();

    let report = fast_service().sync_machine(&db, machine.id).await;
    assert!(report.success, "{}", report.message);
    assert_eq!(report.records_retrieved, 1);
    assert_eq!(report.records_saved, 1);
    assert!(report.unmatched_user_ids.is_empty());

    let rows = AttendanceModel::find_for_person(&db, 100, PersonType::Student)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());

    let synced = MachineEntity::find_by_id(machine.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert!(synced.last_sync_at.is_some());

    let logs = SyncLogModel::find_recent(&db, Some(machine.id), 10)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].0.status, SyncStatus::Success);
    assert_eq!(logs[0].0.records_saved, 1);
    assert!(logs[0].0.completed_at.is_some());

    let audits = AuditModel::find_recent(&db, 10).await.unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].operation_type, "machine_sync");
    assert_eq!(audits[0].performed_by, "system");
    assert_eq!(audits[0].details["source"], "machine");
}

#[tokio::test]
async fn resync_of_the_same_buffer_saves_nothing_new() {
    let db = setup_test_db().await;
    let device = spawn_fake_device(vec![(7, PUNCH_SECS)], Duration::ZERO).await;
    let machine = MachineModel::create(
        &db,
        "Gate A",
        &device.addr.ip().to_string(),
        i32::from(device.addr.port()),
        true,
    )
    .await
    .unwrap();
    MappingModel::create_or_update(&db, 100, PersonType::Student, 7)
        .await
        .unwrap();

    let service = fast_service();
    let first = service.sync_machine(&db, machine.id).await;
    assert_eq!(first.records_saved, 1);

    // The device still returns its whole buffer; everything is older than
    // the new last_sync_at watermark.
    let second = service.sync_machine(&db, machine.id).await;
    assert!(second.success);
    assert_eq!(second.records_retrieved, 1);
    assert_eq!(second.records_saved, 0);

    let rows = AttendanceModel::find_for_person(&db, 100, PersonType::Student)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn unmapped_device_users_are_surfaced() {
    let db = setup_test_db().await;
    let device = spawn_fake_device(vec![(7, PUNCH_SECS), (99, PUNCH_SECS + 60)], Duration::ZERO)
        .await;
    let machine = MachineModel::create(
        &db,
        "Gate A",
        &device.addr.ip().to_string(),
        i32::from(device.addr.port()),
        true,
    )
    .await
    .unwrap();
    MappingModel::create_or_update(&db, 100, PersonType::Student, 7)
        .await
        .unwrap();

    let report = fast_service().sync_machine(&db, machine.id).await;
    assert!(report.success);
    assert_eq!(report.records_saved, 1);
    assert_eq!(report.unmatched_user_ids, vec![99]);
}

#[tokio::test]
async fn unreachable_device_fails_the_run_and_the_sync_log() {
    let db = setup_test_db().await;
    let addr = closed_port_addr().await;
    let machine = MachineModel::create(
        &db,
        "Gate B",
        &addr.ip().to_string(),
        i32::from(addr.port()),
        true,
    )
    .await
    .unwrap();

    let report = fast_service().sync_machine(&db, machine.id).await;
    assert!(!report.success);

    let logs = SyncLogModel::find_recent(&db, Some(machine.id), 10)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].0.status, SyncStatus::Failed);
    assert!(logs[0].0.error_message.is_some());

    // last_sync_at only ever moves on success
    let unchanged = MachineEntity::find_by_id(machine.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert!(unchanged.last_sync_at.is_none());
}

#[tokio::test]
async fn disabled_machines_are_rejected() {
    let db = setup_test_db().await;
    let machine = MachineModel::create(&db, "Mothballed", "10.0.0.9", 4370, false)
        .await
        .unwrap();

    let report = fast_service().sync_machine(&db, machine.id).await;
    assert!(!report.success);
    assert!(report.message.contains("disabled"));
}

#[tokio::test]
async fn concurrent_sync_for_the_same_machine_is_rejected() {
    let db = setup_test_db().await;
    // Slow attlog reply holds the first sync in flight.
    let device = spawn_fake_device(vec![(7, PUNCH_SECS)], Duration::from_millis(400)).await;
    let machine = MachineModel::create(
        &db,
        "Gate A",
        &device.addr.ip().to_string(),
        i32::from(device.addr.port()),
        true,
    )
    .await
    .unwrap();

    let service = Arc::new(fast_service());
    let first = {
        let service = Arc::clone(&service);
        let db = db.clone();
        let machine_id = machine.id;
        tokio::spawn(async move { service.sync_machine(&db, machine_id).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = service.sync_machine(&db, machine.id).await;
    assert!(!second.success);
    assert!(second.message.contains("already in progress"));

    let first = first.await.unwrap();
    assert!(first.success, "{}", first.message);
}

#[tokio::test]
async fn probe_reports_device_identity() {
    let db = setup_test_db().await;
    let device = spawn_fake_device(vec![], Duration::ZERO).await;
    let machine = MachineModel::create(
        &db,
        "Gate A",
        &device.addr.ip().to_string(),
        i32::from(device.addr.port()),
        true,
    )
    .await
    .unwrap();

    let report = fast_service().test_connection(&db, machine.id).await;
    assert!(report.success);
    let info = report.machine_info.unwrap();
    assert_eq!(info.serial_number, "SN-0451");

    // A probe is read-only: no sync log rows, no audit rows.
    let logs = SyncLogModel::find_recent(&db, None, 10).await.unwrap();
    assert!(logs.is_empty());
}
