use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, DatabaseConnection, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Associates an application person with the small integer id a biometric
/// terminal (or its vendor software) assigned to that person at enrollment.
///
/// Unique on `(person_id, person_type)` and on `machine_user_id`; the second
/// constraint is enforced both at the HTTP create path (friendly 409) and at
/// the storage level.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "user_machine_mapping")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub person_id: i64,
    pub person_type: PersonType,
    pub machine_user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Disambiguates which directory a person belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Display, EnumString,
    Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "person_type")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PersonType {
    #[sea_orm(string_value = "student")]
    Student,

    #[sea_orm(string_value = "staff")]
    Staff,
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
    /// Creates a mapping, or re-points the existing mapping for the same
    /// person at a new machine user id.
    pub async fn create_or_update(
        db: &DatabaseConnection,
        person_id: i64,
        person_type: PersonType,
        machine_user_id: i64,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();

        let existing = Entity::find()
            .filter(Column::PersonId.eq(person_id))
            .filter(Column::PersonType.eq(person_type))
            .one(db)
            .await?;

        match existing {
            Some(row) => {
                let mut active: ActiveModel = row.into();
                active.machine_user_id = Set(machine_user_id);
                active.updated_at = Set(now);
                active.update(db).await
            }
            None => {
                let mapping = ActiveModel {
                    person_id: Set(person_id),
                    person_type: Set(person_type),
                    machine_user_id: Set(machine_user_id),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                };
                mapping.insert(db).await
            }
        }
    }

    pub async fn find_by_machine_user_id(
        db: &DatabaseConnection,
        machine_user_id: i64,
    ) -> Result<Option<Self>, DbErr> {
        Entity::find()
            .filter(Column::MachineUserId.eq(machine_user_id))
            .one(db)
            .await
    }

    pub async fn list(
        db: &DatabaseConnection,
        person_type: Option<PersonType>,
    ) -> Result<Vec<Self>, DbErr> {
        let mut query = Entity::find().order_by_asc(Column::MachineUserId);
        if let Some(pt) = person_type {
            query = query.filter(Column::PersonType.eq(pt));
        }
        query.all(db).await
    }
}
