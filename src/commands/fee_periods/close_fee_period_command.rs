use crate::{
    commands::{transaction_error, Command},
    db::DbPool,
    entities::fee_period::{self, FeePeriodStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
};
use chrono::Utc;
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Moves an OPEN period to CLOSED. Closing twice is a state-guard error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseFeePeriodCommand {
    pub period_id: Uuid,
}

#[async_trait::async_trait]
impl Command for CloseFeePeriodCommand {
    type Result = fee_period::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(period_id = %self.period_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let period_id = self.period_id;

        let closed = db_pool
            .transaction::<_, fee_period::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let result = fee_period::Entity::update_many()
                        .col_expr(
                            fee_period::Column::Status,
                            Expr::value(FeePeriodStatus::Closed),
                        )
                        .col_expr(fee_period::Column::UpdatedAt, Expr::value(Some(Utc::now())))
                        .filter(fee_period::Column::Id.eq(period_id))
                        .filter(fee_period::Column::Status.eq(FeePeriodStatus::Open))
                        .exec(txn)
                        .await?;

                    let period = fee_period::Entity::find_by_id(period_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::not_found("Fee period", period_id))?;

                    if result.rows_affected == 0 {
                        return Err(ServiceError::InvalidTransition(format!(
                            "fee period {} is {}, closing requires OPEN",
                            period_id, period.status
                        )));
                    }

                    Ok(period)
                })
            })
            .await
            .map_err(transaction_error)
            .map_err(|e| {
                if matches!(e, ServiceError::InvalidTransition(_)) {
                    metrics::record_state_guard_rejection("close");
                }
                e
            })?;

        metrics::FEE_PERIODS_CLOSED.inc();
        info!(name = %closed.name, "Fee period closed");

        event_sender
            .send_or_log(Event::FeePeriodClosed { period_id })
            .await;

        Ok(closed)
    }
}
