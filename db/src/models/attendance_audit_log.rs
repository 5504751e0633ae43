use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, DatabaseConnection, QueryOrder, QuerySelect, Set};

/// Append-only audit trail: one row per completed sync run across all
/// ingestion sources. `details` carries the structured run summary
/// (source, counts, unmapped ids, truncated error list).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "attendance_audit_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub operation_type: String,
    pub performed_by: String,
    pub details: Json,
    pub created_at: DateTime<Utc>,
}

/// This enum would define relations if any exist. Currently unused.
#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        panic!("No RelationDef implemented")
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn record(
        db: &DatabaseConnection,
        operation_type: &str,
        performed_by: &str,
        details: Json,
    ) -> Result<Self, DbErr> {
        let entry = ActiveModel {
            operation_type: Set(operation_type.to_owned()),
            performed_by: Set(performed_by.to_owned()),
            details: Set(details),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        entry.insert(db).await
    }

    pub async fn find_recent(db: &DatabaseConnection, limit: u64) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .order_by_desc(Column::CreatedAt)
            .limit(limit)
            .all(db)
            .await
    }
}
