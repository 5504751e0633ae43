pub mod attendance_audit_log;
pub mod dual_mode_attendance;
pub mod machine_config;
pub mod sync_log;
pub mod user_machine_mapping;

pub use attendance_audit_log::Entity as AttendanceAuditLog;
pub use dual_mode_attendance::Entity as DualModeAttendance;
pub use machine_config::Entity as MachineConfig;
pub use sync_log::Entity as SyncLog;
pub use user_machine_mapping::Entity as UserMachineMapping;
