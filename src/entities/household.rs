use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Registration state of a household.
///
/// `MovedOut` is terminal: no transition leaves it.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum HouseholdStatus {
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "TEMPORARY")]
    Temporary,
    #[sea_orm(string_value = "MOVED_OUT")]
    #[serde(alias = "INACTIVE")]
    MovedOut,
}

impl HouseholdStatus {
    pub fn is_billable(self) -> bool {
        matches!(self, HouseholdStatus::Active)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "households")]
#[schema(as = Household)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub household_code: String,
    pub owner_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub move_in_date: Option<NaiveDate>,
    pub status: HouseholdStatus,
    pub apartment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::apartment::Entity",
        from = "Column::ApartmentId",
        to = "super::apartment::Column::Id",
        on_delete = "SetNull"
    )]
    Apartment,
    #[sea_orm(has_many = "super::resident::Entity")]
    Residents,
    #[sea_orm(has_many = "super::vehicle::Entity")]
    Vehicles,
    #[sea_orm(has_many = "super::fee_obligation::Entity")]
    FeeObligations,
}

impl Related<super::apartment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Apartment.def()
    }
}

impl Related<super::resident::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Residents.def()
    }
}

impl Related<super::vehicle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vehicles.def()
    }
}

impl Related<super::fee_obligation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FeeObligations.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            active_model.created_at = Set(now);
        }
        active_model.updated_at = Set(Some(now));

        Ok(active_model)
    }
}
