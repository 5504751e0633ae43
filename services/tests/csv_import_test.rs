use db::models::{
    attendance_audit_log::Model as AuditModel,
    dual_mode_attendance::Model as AttendanceModel,
    user_machine_mapping::{Model as MappingModel, PersonType},
};
use db::test_utils::setup_test_db;
use services::csv_import::import_file;
use tempfile::TempDir;

fn export_content(rows: &[&str]) -> String {
    let times: Vec<String> = (1..=12).map(|n| format!("Time{n}")).collect();
    let mut content = format!(
        "Department, Name, Staff Code, Date, Week, {}\n",
        times.join(", ")
    );
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    content
}

#[tokio::test]
async fn import_resolves_saves_and_cleans_up() {
    let db = setup_test_db().await;
    MappingModel::create_or_update(&db, 300, PersonType::Staff, 42)
        .await
        .unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("attendance_export.csv");
    tokio::fs::write(
        &path,
        export_content(&[
            "Maths, Jane, 42, 1/10/2025, Fri, , 08:15, 12:30, , , , , , , , ,",
            "Maths, Joe, 55, 1/10/2025, Fri, 07:58, , , , , , , , , , ,",
        ]),
    )
    .await
    .unwrap();

    let report = import_file(&db, &path).await;
    assert!(report.success, "{}", report.message);
    assert_eq!(report.records_processed, 2);
    assert_eq!(report.records_saved, 1);
    assert_eq!(report.unmapped_staff_codes, vec![55]);
    assert!(report.errors.is_empty());

    // Temp upload is deleted regardless of outcome.
    assert!(!path.exists());

    let rows = AttendanceModel::find_for_person(&db, 300, PersonType::Staff)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    // First non-blank punch wins.
    assert_eq!(rows[0].timestamp.to_rfc3339(), "2025-01-10T08:15:00+00:00");
    assert_eq!(rows[0].source_tag, "attendance_export.csv");

    let audits = AuditModel::find_recent(&db, 10).await.unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].details["source"], "csv_import");
    assert_eq!(audits[0].details["file"], "attendance_export.csv");
}

#[tokio::test]
async fn bad_header_fails_but_still_cleans_up() {
    let db = setup_test_db().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("not_an_export.csv");
    tokio::fs::write(&path, "a,b,c\n1,2,3\n").await.unwrap();

    let report = import_file(&db, &path).await;
    assert!(!report.success);
    assert!(report.message.contains("missing"));
    assert!(!path.exists());

    // Nothing reconciled, nothing audited.
    let audits = AuditModel::find_recent(&db, 10).await.unwrap();
    assert!(audits.is_empty());
}

#[tokio::test]
async fn reimporting_the_same_file_is_idempotent() {
    let db = setup_test_db().await;
    MappingModel::create_or_update(&db, 300, PersonType::Staff, 42)
        .await
        .unwrap();

    let dir = TempDir::new().unwrap();
    let content =
        export_content(&["Maths, Jane, 42, 1/10/2025, Fri, 08:15, , , , , , , , , , ,"]);

    for run in 0..2 {
        let path = dir.path().join(format!("export_{run}.csv"));
        tokio::fs::write(&path, &content).await.unwrap();
        let report = import_file(&db, &path).await;
        assert!(report.success);
    }

    let rows = AttendanceModel::find_for_person(&db, 300, PersonType::Staff)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}
