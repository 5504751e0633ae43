use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, DatabaseConnection, QueryOrder, QuerySelect, Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One row per live-device sync attempt.
///
/// Created in `pending` state when the attempt starts and finalized exactly
/// once; never mutated after completion.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "sync_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub machine_id: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: SyncStatus,
    pub records_retrieved: i32,
    pub records_saved: i32,
    pub error_message: Option<String>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString,
    Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "sync_status")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SyncStatus {
    #[sea_orm(string_value = "pending")]
    Pending,

    #[sea_orm(string_value = "success")]
    Success,

    #[sea_orm(string_value = "failed")]
    Failed,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::machine_config::Entity",
        from = "Column::MachineId",
        to = "super::machine_config::Column::Id"
    )]
    Machine,
}

impl Related<super::machine_config::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Machine.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Opens a pending log row at the start of a sync attempt.
    pub async fn start(
        db: &DatabaseConnection,
        machine_id: i64,
        started_at: DateTime<Utc>,
    ) -> Result<Self, DbErr> {
        let log = ActiveModel {
            machine_id: Set(machine_id),
            started_at: Set(started_at),
            completed_at: Set(None),
            status: Set(SyncStatus::Pending),
            records_retrieved: Set(0),
            records_saved: Set(0),
            error_message: Set(None),
            ..Default::default()
        };
        log.insert(db).await
    }

    /// Finalizes the log row once the attempt has run to completion.
    pub async fn complete(
        db: &DatabaseConnection,
        id: i64,
        status: SyncStatus,
        records_retrieved: i32,
        records_saved: i32,
        error_message: Option<String>,
    ) -> Result<(), DbErr> {
        let Some(log) = Entity::find_by_id(id).one(db).await? else {
            return Err(DbErr::RecordNotFound(format!("Sync log ID {id} not found")));
        };
        let mut active: ActiveModel = log.into();
        active.completed_at = Set(Some(Utc::now()));
        active.status = Set(status);
        active.records_retrieved = Set(records_retrieved);
        active.records_saved = Set(records_saved);
        active.error_message = Set(error_message);
        active.update(db).await?;
        Ok(())
    }

    /// Most recent attempts first, optionally scoped to one machine.
    pub async fn find_recent(
        db: &DatabaseConnection,
        machine_id: Option<i64>,
        limit: u64,
    ) -> Result<Vec<(Self, Option<super::machine_config::Model>)>, DbErr> {
        let mut query = Entity::find()
            .find_also_related(super::machine_config::Entity)
            .order_by_desc(Column::StartedAt)
            .limit(limit);
        if let Some(machine_id) = machine_id {
            query = query.filter(Column::MachineId.eq(machine_id));
        }
        query.all(db).await
    }
}
