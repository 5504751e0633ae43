use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, Set};

use super::user_machine_mapping::PersonType;

/// A machine-sourced attendance row.
///
/// At most one row exists per `(person_id, person_type, date, timestamp)`
/// tuple; inserts of an already-seen punch are silently ignored so that
/// overlapping sync windows can be re-processed safely. Rows are only ever
/// created by the reconciliation engine, never updated or deleted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "dual_mode_attendance")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub person_id: i64,
    pub person_type: PersonType,
    pub date: NaiveDate,
    pub status: String,
    pub source_type: String,
    pub source_tag: String,
    pub timestamp: DateTime<Utc>,
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
    /// Inserts a punch row unless the exact punch is already recorded.
    ///
    /// Returns `true` when a new row was written, `false` when the unique
    /// index absorbed a duplicate.
    pub async fn insert_ignore(
        db: &DatabaseConnection,
        person_id: i64,
        person_type: PersonType,
        timestamp: DateTime<Utc>,
        source_type: &str,
        source_tag: &str,
    ) -> Result<bool, DbErr> {
        let row = ActiveModel {
            person_id: Set(person_id),
            person_type: Set(person_type),
            date: Set(timestamp.date_naive()),
            status: Set("present".to_owned()),
            source_type: Set(source_type.to_owned()),
            source_tag: Set(source_tag.to_owned()),
            timestamp: Set(timestamp),
            ..Default::default()
        };

        let insert = Entity::insert(row)
            .on_conflict(
                OnConflict::columns([
                    Column::PersonId,
                    Column::PersonType,
                    Column::Date,
                    Column::Timestamp,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec(db)
            .await;

        match insert {
            Ok(_) => Ok(true),
            Err(DbErr::RecordNotInserted) => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub async fn find_for_person(
        db: &DatabaseConnection,
        person_id: i64,
        person_type: PersonType,
    ) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::PersonId.eq(person_id))
            .filter(Column::PersonType.eq(person_type))
            .all(db)
            .await
    }
}
