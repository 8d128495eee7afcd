use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::fee_obligation::PaymentMethod;

/// Append-only record of one accepted payment.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "fee_payments")]
#[schema(as = FeePayment)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub obligation_id: Uuid,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payer_name: Option<String>,
    pub note: Option<String>,
    /// Username of the operator who recorded the payment
    pub recorded_by: Option<String>,
    pub paid_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::fee_obligation::Entity",
        from = "Column::ObligationId",
        to = "super::fee_obligation::Column::Id",
        on_delete = "Cascade"
    )]
    Obligation,
}

impl Related<super::fee_obligation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Obligation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
