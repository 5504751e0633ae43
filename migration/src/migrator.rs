use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202510010001_create_machine_config::Migration),
            Box::new(migrations::m202510010002_create_user_machine_mapping::Migration),
            Box::new(migrations::m202510010003_create_dual_mode_attendance::Migration),
            Box::new(migrations::m202510010004_create_sync_log::Migration),
            Box::new(migrations::m202510010005_create_attendance_audit_log::Migration),
        ]
    }
}
