use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Billing period lifecycle: `Draft -> Open -> Closed`.
///
/// `generate` moves a period out of `Draft`, `close` moves it out of `Open`.
/// Nothing leaves `Closed`.
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
pub enum FeePeriodStatus {
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    #[sea_orm(string_value = "OPEN")]
    Open,
    #[sea_orm(string_value = "CLOSED")]
    Closed,
}

impl FeePeriodStatus {
    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: FeePeriodStatus) -> bool {
        matches!(
            (self, next),
            (FeePeriodStatus::Draft, FeePeriodStatus::Open)
                | (FeePeriodStatus::Open, FeePeriodStatus::Closed)
        )
    }

    /// Only draft periods may be renamed, re-dated or deleted.
    pub fn is_editable(self) -> bool {
        self == FeePeriodStatus::Draft
    }

    /// Payments are accepted only while a period is open.
    pub fn accepts_payments(self) -> bool {
        self == FeePeriodStatus::Open
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "fee_periods")]
#[schema(as = FeePeriod)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub status: FeePeriodStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::fee_obligation::Entity")]
    FeeObligations,
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

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(FeePeriodStatus::Draft, FeePeriodStatus::Open, true)]
    #[case(FeePeriodStatus::Open, FeePeriodStatus::Closed, true)]
    #[case(FeePeriodStatus::Draft, FeePeriodStatus::Closed, false)]
    #[case(FeePeriodStatus::Open, FeePeriodStatus::Draft, false)]
    #[case(FeePeriodStatus::Closed, FeePeriodStatus::Open, false)]
    #[case(FeePeriodStatus::Closed, FeePeriodStatus::Closed, false)]
    fn lifecycle_transitions(
        #[case] from: FeePeriodStatus,
        #[case] to: FeePeriodStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("open".parse::<FeePeriodStatus>().unwrap(), FeePeriodStatus::Open);
        assert_eq!(FeePeriodStatus::Closed.to_string(), "CLOSED");
        assert!("REOPENED".parse::<FeePeriodStatus>().is_err());
    }
}
