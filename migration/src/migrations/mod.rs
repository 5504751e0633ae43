pub mod m202510010001_create_machine_config;
pub mod m202510010002_create_user_machine_mapping;
pub mod m202510010003_create_dual_mode_attendance;
pub mod m202510010004_create_sync_log;
pub mod m202510010005_create_attendance_audit_log;
