use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

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
pub enum PaymentMethod {
    #[sea_orm(string_value = "CASH")]
    Cash,
    #[sea_orm(string_value = "BANK_TRANSFER")]
    BankTransfer,
}

/// Settlement state of an obligation.
///
/// Never stored; always derived from the amounts so a partial state can be
/// added later without touching the table.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ObligationStatus {
    Unpaid,
    Paid,
}

impl ObligationStatus {
    /// `Paid` once the collected amount covers the expected amount.
    /// A partial payment leaves the obligation `Unpaid`.
    pub fn derive(expected_amount: Decimal, paid_amount: Decimal) -> Self {
        if paid_amount >= expected_amount {
            ObligationStatus::Paid
        } else {
            ObligationStatus::Unpaid
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "fee_obligations")]
#[schema(as = FeeObligation)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub household_id: Uuid,
    pub fee_item_id: Uuid,
    /// Fee item name at generation time
    pub fee_item_name: String,
    pub fee_period_id: Uuid,
    /// Period name at generation time
    pub period_label: String,
    pub expected_amount: Decimal,
    pub paid_amount: Decimal,
    pub due_date: NaiveDate,
    pub payer_name: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<PaymentMethod>,
    pub note: Option<String>,
    /// Bumped on every payment; guards concurrent writers
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn status(&self) -> ObligationStatus {
        ObligationStatus::derive(self.expected_amount, self.paid_amount)
    }

    pub fn remaining_amount(&self) -> Decimal {
        (self.expected_amount - self.paid_amount).max(Decimal::ZERO)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::household::Entity",
        from = "Column::HouseholdId",
        to = "super::household::Column::Id",
        on_delete = "Cascade"
    )]
    Household,
    #[sea_orm(
        belongs_to = "super::fee_item::Entity",
        from = "Column::FeeItemId",
        to = "super::fee_item::Column::Id",
        on_delete = "Restrict"
    )]
    FeeItem,
    #[sea_orm(
        belongs_to = "super::fee_period::Entity",
        from = "Column::FeePeriodId",
        to = "super::fee_period::Column::Id",
        on_delete = "Cascade"
    )]
    FeePeriod,
    #[sea_orm(has_many = "super::fee_payment::Entity")]
    Payments,
}

impl Related<super::household::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Household.def()
    }
}

impl Related<super::fee_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FeeItem.def()
    }
}

impl Related<super::fee_period::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FeePeriod.def()
    }
}

impl Related<super::fee_payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
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
