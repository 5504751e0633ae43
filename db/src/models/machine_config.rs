use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

/// One physical biometric terminal.
///
/// Rows are created and edited by an administrator; the sync layer treats
/// them as read-only apart from `last_sync_at`, which is advanced after
/// every successful run.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "machine_config")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub ip_address: String,
    pub port: i32,
    pub enabled: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sync_log::Entity")]
    SyncLogs,
}

impl Related<super::sync_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SyncLogs.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create(
        db: &DatabaseConnection,
        name: &str,
        ip_address: &str,
        port: i32,
        enabled: bool,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let machine = ActiveModel {
            name: Set(name.to_owned()),
            ip_address: Set(ip_address.to_owned()),
            port: Set(port),
            enabled: Set(enabled),
            last_sync_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        machine.insert(db).await
    }

    /// Advances `last_sync_at` after a successful sync run.
    pub async fn mark_synced(
        db: &DatabaseConnection,
        id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), DbErr> {
        let Some(machine) = Entity::find_by_id(id).one(db).await? else {
            return Err(DbErr::RecordNotFound(format!(
                "Machine ID {id} not found"
            )));
        };
        let mut active: ActiveModel = machine.into();
        active.last_sync_at = Set(Some(at));
        active.updated_at = Set(Utc::now());
        active.update(db).await?;
        Ok(())
    }
}
