use crate::{
    commands::{transaction_error, Command},
    db::DbPool,
    entities::{
        fee_obligation::{self, ObligationStatus, PaymentMethod},
        fee_payment,
        fee_period::{self, FeePeriodStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Query},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        return Err(ValidationError::new("paid_amount must be greater than zero"));
    }
    Ok(())
}

/// Records one payment against an obligation.
///
/// The amount is added to what was already collected, so a second partial
/// payment settles the remainder. Overpayment is accepted.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PayFeeObligationCommand {
    pub obligation_id: Uuid,
    #[validate(custom = "validate_positive_amount")]
    pub paid_amount: Decimal,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 255))]
    pub payer_name: Option<String>,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
    /// Version the caller last saw; a mismatch is a concurrent modification
    pub expected_version: Option<i32>,
    pub recorded_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PayFeeObligationResult {
    pub obligation: fee_obligation::Model,
    pub payment: fee_payment::Model,
    pub status: ObligationStatus,
}

#[async_trait::async_trait]
impl Command for PayFeeObligationCommand {
    type Result = PayFeeObligationResult;

    #[instrument(skip(self, db_pool, event_sender), fields(obligation_id = %self.obligation_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let command = self.clone();
        let result = db_pool
            .transaction::<_, PayFeeObligationResult, ServiceError>(move |txn| {
                Box::pin(async move { command.pay_in_txn(txn).await })
            })
            .await
            .map_err(transaction_error)
            .map_err(|e| {
                if matches!(e, ServiceError::InvalidTransition(_)) {
                    metrics::record_state_guard_rejection("pay");
                }
                e
            })?;

        metrics::record_payment(self.paid_amount);
        let fully_paid = result.status == ObligationStatus::Paid;
        info!(
            amount = %self.paid_amount,
            paid_total = %result.obligation.paid_amount,
            fully_paid,
            "Payment recorded"
        );

        event_sender
            .send_or_log(Event::ObligationPaid {
                obligation_id: self.obligation_id,
                amount: self.paid_amount,
                fully_paid,
            })
            .await;

        Ok(result)
    }
}

impl PayFeeObligationCommand {
    async fn pay_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<PayFeeObligationResult, ServiceError> {
        let obligation = fee_obligation::Entity::find_by_id(self.obligation_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Fee obligation", self.obligation_id))?;

        let period = fee_period::Entity::find_by_id(obligation.fee_period_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Fee period", obligation.fee_period_id))?;

        match period.status {
            FeePeriodStatus::Open => {}
            FeePeriodStatus::Closed => {
                return Err(ServiceError::InvalidTransition(format!(
                    "fee period {} is CLOSED, payments are no longer accepted",
                    period.name
                )))
            }
            FeePeriodStatus::Draft => {
                return Err(ServiceError::InvalidTransition(format!(
                    "fee period {} is still DRAFT, payments open after generation",
                    period.name
                )))
            }
        }

        if obligation.status() == ObligationStatus::Paid {
            return Err(ServiceError::InvalidTransition(format!(
                "fee obligation {} is already PAID",
                obligation.id
            )));
        }

        if let Some(expected) = self.expected_version {
            if expected != obligation.version {
                warn!(
                    expected,
                    actual = obligation.version,
                    "Stale obligation version on payment"
                );
                return Err(ServiceError::ConcurrentModification(obligation.id));
            }
        }

        let now = Utc::now();
        if self.record_collection(txn, &obligation, now).await? == 0 {
            // Either a close committed after the status check or another
            // payment bumped the version.
            let still_open = fee_period::Entity::find_by_id(obligation.fee_period_id)
                .one(txn)
                .await?
                .is_some_and(|p| p.status == FeePeriodStatus::Open);
            if !still_open {
                return Err(ServiceError::InvalidTransition(format!(
                    "fee period {} closed before the payment was recorded",
                    period.name
                )));
            }
            return Err(ServiceError::ConcurrentModification(obligation.id));
        }

        let payment = fee_payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            obligation_id: Set(obligation.id),
            amount: Set(self.paid_amount),
            payment_method: Set(self.payment_method),
            payer_name: Set(self.payer_name.clone()),
            note: Set(self.note.clone()),
            recorded_by: Set(self.recorded_by.clone()),
            paid_at: Set(now),
        }
        .insert(txn)
        .await?;

        let obligation = fee_obligation::Entity::find_by_id(obligation.id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Fee obligation", obligation.id))?;
        let status = obligation.status();

        Ok(PayFeeObligationResult {
            obligation,
            payment,
            status,
        })
    }

    /// Adds the amount onto `obligation` as last read. Matches only while the
    /// version is unchanged and the owning period is still OPEN; returns the
    /// number of rows written.
    async fn record_collection<C: ConnectionTrait>(
        &self,
        db: &C,
        obligation: &fee_obligation::Model,
        now: DateTime<Utc>,
    ) -> Result<u64, DbErr> {
        let open_periods = Query::select()
            .column(fee_period::Column::Id)
            .from(fee_period::Entity)
            .and_where(fee_period::Column::Status.eq(FeePeriodStatus::Open))
            .to_owned();

        let updated = fee_obligation::Entity::update_many()
            .col_expr(
                fee_obligation::Column::PaidAmount,
                Expr::value(obligation.paid_amount + self.paid_amount),
            )
            .col_expr(
                fee_obligation::Column::Version,
                Expr::value(obligation.version + 1),
            )
            .col_expr(fee_obligation::Column::PaidAt, Expr::value(Some(now)))
            .col_expr(
                fee_obligation::Column::PayerName,
                Expr::value(self.payer_name.clone()),
            )
            .col_expr(
                fee_obligation::Column::PaymentMethod,
                Expr::value(Some(self.payment_method)),
            )
            .col_expr(fee_obligation::Column::Note, Expr::value(self.note.clone()))
            .col_expr(fee_obligation::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(fee_obligation::Column::Id.eq(obligation.id))
            .filter(fee_obligation::Column::Version.eq(obligation.version))
            .filter(fee_obligation::Column::FeePeriodId.in_subquery(open_periods))
            .exec(db)
            .await?;
        Ok(updated.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        entities::{fee_item::FeeUnit, household::HouseholdStatus},
        services::{
            fee_periods::{CreateFeePeriodRequest, FeePeriodService},
            test_support,
        },
    };
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn command(amount: Decimal) -> PayFeeObligationCommand {
        PayFeeObligationCommand {
            obligation_id: Uuid::new_v4(),
            paid_amount: amount,
            payment_method: PaymentMethod::Cash,
            payer_name: None,
            note: None,
            expected_version: None,
            recorded_by: None,
        }
    }

    #[test]
    fn non_positive_amounts_fail_validation() {
        assert!(command(dec!(0)).validate().is_err());
        assert!(command(dec!(-5000)).validate().is_err());
        assert!(command(dec!(1)).validate().is_ok());
    }

    #[tokio::test]
    async fn collection_does_not_land_once_the_period_closes() {
        let db = test_support::setup_db().await;
        let periods = FeePeriodService::new(db.clone(), test_support::event_sender());
        test_support::household(&db, "HK020", None, HouseholdStatus::Active).await;
        test_support::fee_item(&db, "Phí vệ sinh", FeeUnit::Fixed, dec!(30000)).await;
        let period = periods
            .create_fee_period(CreateFeePeriodRequest {
                name: "11/2025".to_string(),
                start_date: NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2025, 11, 30).unwrap(),
            })
            .await
            .unwrap();
        periods.generate_obligations(period.id).await.unwrap();

        // Snapshot read while the period was OPEN.
        let snapshot = fee_obligation::Entity::find()
            .one(&*db)
            .await
            .unwrap()
            .unwrap();
        periods.close_fee_period(period.id).await.unwrap();

        let mut pay = command(dec!(30000));
        pay.obligation_id = snapshot.id;
        let written = pay
            .record_collection(&*db, &snapshot, Utc::now())
            .await
            .unwrap();
        assert_eq!(written, 0);

        let reloaded = fee_obligation::Entity::find_by_id(snapshot.id)
            .one(&*db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.paid_amount, Decimal::ZERO);
        assert_eq!(reloaded.version, snapshot.version);
    }

    #[tokio::test]
    async fn collection_lands_while_the_period_is_open() {
        let db = test_support::setup_db().await;
        let periods = FeePeriodService::new(db.clone(), test_support::event_sender());
        test_support::household(&db, "HK021", None, HouseholdStatus::Active).await;
        test_support::fee_item(&db, "Phí vệ sinh", FeeUnit::Fixed, dec!(30000)).await;
        let period = periods
            .create_fee_period(CreateFeePeriodRequest {
                name: "11/2025".to_string(),
                start_date: NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2025, 11, 30).unwrap(),
            })
            .await
            .unwrap();
        periods.generate_obligations(period.id).await.unwrap();
        let snapshot = fee_obligation::Entity::find()
            .one(&*db)
            .await
            .unwrap()
            .unwrap();

        let mut pay = command(dec!(10000));
        pay.obligation_id = snapshot.id;
        let written = pay
            .record_collection(&*db, &snapshot, Utc::now())
            .await
            .unwrap();
        assert_eq!(written, 1);
    }
}
