use crate::{
    commands::{
        fee_obligations::{PayFeeObligationCommand, PayFeeObligationResult},
        Command,
    },
    db::DbPool,
    entities::{
        fee_item,
        fee_obligation::{self, ObligationStatus, PaymentMethod},
        fee_payment,
        fee_period::{self, FeePeriodStatus},
        household,
    },
    errors::ServiceError,
    events::EventSender,
    metrics,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Query},
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn validate_non_negative(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount < Decimal::ZERO {
        return Err(ValidationError::new("amount must not be negative"));
    }
    Ok(())
}

/// Filters for obligation listings. All are optional and combine with AND.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObligationFilter {
    pub household_id: Option<Uuid>,
    pub period_id: Option<Uuid>,
    pub status: Option<ObligationStatus>,
}

/// Obligation as shown to operators: the stored row joined with its
/// household and period plus the derived settlement fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "0c7c4a2e-6f53-4b43-9d0e-2c7a0a3b9f10",
    "household_id": "a3d8f1a2-1b4c-4d5e-8f9a-0b1c2d3e4f50",
    "household_code": "HK001",
    "owner_name": "Nguyễn Văn An",
    "fee_item_id": "5e6f7a8b-9c0d-4e1f-a2b3-c4d5e6f7a8b9",
    "fee_item_name": "Phí dịch vụ chung cư",
    "fee_period_id": "8b9c0d1e-2f3a-4b5c-9d6e-7f8a9b0c1d2e",
    "period_label": "12/2025",
    "period_status": "OPEN",
    "expected_amount": "525000",
    "paid_amount": "200000",
    "remaining_amount": "325000",
    "status": "UNPAID",
    "overdue": false,
    "due_date": "2025-12-31",
    "version": 1
}))]
pub struct FeeObligationView {
    pub id: Uuid,
    pub household_id: Uuid,
    pub household_code: Option<String>,
    pub owner_name: Option<String>,
    pub fee_item_id: Uuid,
    pub fee_item_name: String,
    pub fee_period_id: Uuid,
    pub period_label: String,
    pub period_status: Option<FeePeriodStatus>,
    pub expected_amount: Decimal,
    pub paid_amount: Decimal,
    pub remaining_amount: Decimal,
    pub status: ObligationStatus,
    /// Unpaid while the period is already closed
    pub overdue: bool,
    pub due_date: NaiveDate,
    pub payer_name: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<PaymentMethod>,
    pub note: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl FeeObligationView {
    pub fn build(
        model: fee_obligation::Model,
        household: Option<&household::Model>,
        period_status: Option<FeePeriodStatus>,
    ) -> Self {
        let status = model.status();
        let remaining_amount = model.remaining_amount();
        Self {
            id: model.id,
            household_id: model.household_id,
            household_code: household.map(|h| h.household_code.clone()),
            owner_name: household.map(|h| h.owner_name.clone()),
            fee_item_id: model.fee_item_id,
            fee_item_name: model.fee_item_name,
            fee_period_id: model.fee_period_id,
            period_label: model.period_label,
            period_status,
            expected_amount: model.expected_amount,
            paid_amount: model.paid_amount,
            remaining_amount,
            status,
            overdue: status == ObligationStatus::Unpaid
                && period_status == Some(FeePeriodStatus::Closed),
            due_date: model.due_date,
            payer_name: model.payer_name,
            paid_at: model.paid_at,
            payment_method: model.payment_method,
            note: model.note,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Single obligation added by hand outside of a generation run.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateFeeObligationRequest {
    pub household_id: Uuid,
    pub fee_item_id: Uuid,
    pub fee_period_id: Uuid,
    /// Defaults to the fee item's cost
    #[validate(custom = "validate_non_negative")]
    pub expected_amount: Option<Decimal>,
    /// Defaults to the period's end date
    pub due_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

/// Corrects the billing fields of one obligation. Absent fields are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateFeeObligationRequest {
    #[validate(custom = "validate_non_negative")]
    pub expected_amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
    /// Version the caller last saw; a mismatch is a concurrent modification
    pub expected_version: Option<i32>,
}

#[derive(Clone)]
pub struct FeeObligationService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl FeeObligationService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Lists obligations matching `filter`, ordered by period then household.
    #[instrument(skip(self))]
    pub async fn list_fee_obligations(
        &self,
        filter: ObligationFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<FeeObligationView>, u64), ServiceError> {
        let mut condition = Condition::all();
        if let Some(household_id) = filter.household_id {
            condition = condition.add(fee_obligation::Column::HouseholdId.eq(household_id));
        }
        if let Some(period_id) = filter.period_id {
            condition = condition.add(fee_obligation::Column::FeePeriodId.eq(period_id));
        }
        match filter.status {
            Some(ObligationStatus::Paid) => {
                condition = condition.add(
                    Expr::col(fee_obligation::Column::PaidAmount)
                        .gte(Expr::col(fee_obligation::Column::ExpectedAmount)),
                );
            }
            Some(ObligationStatus::Unpaid) => {
                condition = condition.add(
                    Expr::col(fee_obligation::Column::PaidAmount)
                        .lt(Expr::col(fee_obligation::Column::ExpectedAmount)),
                );
            }
            None => {}
        }

        let paginator = fee_obligation::Entity::find()
            .filter(condition)
            .order_by_desc(fee_obligation::Column::DueDate)
            .order_by_asc(fee_obligation::Column::HouseholdId)
            .order_by_asc(fee_obligation::Column::FeeItemName)
            .paginate(&*self.db_pool, limit);

        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page.saturating_sub(1)).await?;
        let views = self.decorate(models).await?;
        Ok((views, total))
    }

    #[instrument(skip(self))]
    pub async fn get_fee_obligation(
        &self,
        id: &Uuid,
    ) -> Result<Option<FeeObligationView>, ServiceError> {
        let Some(model) = fee_obligation::Entity::find_by_id(*id)
            .one(&*self.db_pool)
            .await?
        else {
            return Ok(None);
        };
        Ok(self.decorate(vec![model]).await?.into_iter().next())
    }

    /// Adds one obligation to a DRAFT or OPEN period.
    #[instrument(skip(self))]
    pub async fn create_fee_obligation(
        &self,
        request: CreateFeeObligationRequest,
    ) -> Result<FeeObligationView, ServiceError> {
        request.validate()?;
        let db = &*self.db_pool;

        let household = household::Entity::find_by_id(request.household_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Household", request.household_id))?;
        let item = fee_item::Entity::find_by_id(request.fee_item_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Fee item", request.fee_item_id))?;
        let period = fee_period::Entity::find_by_id(request.fee_period_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Fee period", request.fee_period_id))?;

        if period.status == FeePeriodStatus::Closed {
            metrics::record_state_guard_rejection("create_obligation");
            return Err(ServiceError::InvalidTransition(format!(
                "fee period {} is CLOSED",
                period.id
            )));
        }

        let expected_amount = request.expected_amount.unwrap_or(item.cost).trunc();
        let created = fee_obligation::ActiveModel {
            id: Set(Uuid::new_v4()),
            household_id: Set(household.id),
            fee_item_id: Set(item.id),
            fee_item_name: Set(item.name.clone()),
            fee_period_id: Set(period.id),
            period_label: Set(period.name.clone()),
            expected_amount: Set(expected_amount),
            paid_amount: Set(Decimal::ZERO),
            due_date: Set(request.due_date.unwrap_or(period.end_date)),
            payer_name: Set(None),
            paid_at: Set(None),
            payment_method: Set(None),
            note: Set(request.note),
            version: Set(0),
            ..Default::default()
        }
        .insert(db)
        .await?;

        metrics::OBLIGATIONS_CREATED.inc();
        info!(
            obligation_id = %created.id,
            household_code = %household.household_code,
            fee_item = %item.name,
            "Manual fee obligation created"
        );

        Ok(FeeObligationView::build(
            created,
            Some(&household),
            Some(period.status),
        ))
    }

    /// Edits expected amount, due date or note while the period is not CLOSED.
    ///
    /// Bumps `version` the same way a payment does, so an edit and a payment
    /// racing on one obligation cannot both land.
    #[instrument(skip(self))]
    pub async fn update_fee_obligation(
        &self,
        id: Uuid,
        request: UpdateFeeObligationRequest,
    ) -> Result<FeeObligationView, ServiceError> {
        request.validate()?;
        let db = &*self.db_pool;

        let obligation = fee_obligation::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Fee obligation", id))?;
        self.ensure_period_not_closed(&obligation, "update_obligation").await?;

        if let Some(expected) = request.expected_version {
            if expected != obligation.version {
                warn!(
                    expected,
                    actual = obligation.version,
                    "Stale obligation version on edit"
                );
                return Err(ServiceError::ConcurrentModification(id));
            }
        }

        let mutable_periods = Query::select()
            .column(fee_period::Column::Id)
            .from(fee_period::Entity)
            .and_where(fee_period::Column::Status.ne(FeePeriodStatus::Closed))
            .to_owned();

        let mut update = fee_obligation::Entity::update_many()
            .col_expr(
                fee_obligation::Column::Version,
                Expr::value(obligation.version + 1),
            )
            .col_expr(
                fee_obligation::Column::UpdatedAt,
                Expr::value(Some(Utc::now())),
            );
        if let Some(amount) = request.expected_amount {
            update = update.col_expr(
                fee_obligation::Column::ExpectedAmount,
                Expr::value(amount.trunc()),
            );
        }
        if let Some(due_date) = request.due_date {
            update = update.col_expr(fee_obligation::Column::DueDate, Expr::value(due_date));
        }
        if let Some(note) = request.note {
            update = update.col_expr(fee_obligation::Column::Note, Expr::value(Some(note)));
        }

        let result = update
            .filter(fee_obligation::Column::Id.eq(id))
            .filter(fee_obligation::Column::Version.eq(obligation.version))
            .filter(fee_obligation::Column::FeePeriodId.in_subquery(mutable_periods))
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            // A close may have committed since the check above.
            self.ensure_period_not_closed(&obligation, "update_obligation").await?;
            return Err(ServiceError::ConcurrentModification(id));
        }

        info!(obligation_id = %id, "Fee obligation updated");
        self.get_fee_obligation(&id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Fee obligation", id))
    }

    /// Removes an obligation that has collected nothing and whose period is
    /// still mutable.
    #[instrument(skip(self))]
    pub async fn delete_fee_obligation(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let obligation = fee_obligation::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Fee obligation", id))?;

        self.ensure_period_not_closed(&obligation, "delete_obligation").await?;

        // Conditional on nothing collected so a concurrent payment wins.
        let result = fee_obligation::Entity::delete_many()
            .filter(fee_obligation::Column::Id.eq(id))
            .filter(fee_obligation::Column::PaidAmount.eq(Decimal::ZERO))
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "fee obligation {} has recorded payments",
                id
            )));
        }

        info!(obligation_id = %id, "Fee obligation deleted");
        Ok(())
    }

    /// Applies a payment; see [`PayFeeObligationCommand`].
    #[instrument(skip(self))]
    pub async fn pay_fee_obligation(
        &self,
        command: PayFeeObligationCommand,
    ) -> Result<PayFeeObligationResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Payment history of one obligation, oldest first.
    #[instrument(skip(self))]
    pub async fn list_payments(
        &self,
        obligation_id: Uuid,
    ) -> Result<Vec<fee_payment::Model>, ServiceError> {
        let db = &*self.db_pool;
        if fee_obligation::Entity::find_by_id(obligation_id)
            .one(db)
            .await?
            .is_none()
        {
            return Err(ServiceError::not_found("Fee obligation", obligation_id));
        }

        Ok(fee_payment::Entity::find()
            .filter(fee_payment::Column::ObligationId.eq(obligation_id))
            .order_by_asc(fee_payment::Column::PaidAt)
            .all(db)
            .await?)
    }

    async fn ensure_period_not_closed(
        &self,
        obligation: &fee_obligation::Model,
        op: &'static str,
    ) -> Result<(), ServiceError> {
        let period_status = fee_period::Entity::find_by_id(obligation.fee_period_id)
            .one(&*self.db_pool)
            .await?
            .map(|p| p.status);
        if period_status == Some(FeePeriodStatus::Closed) {
            metrics::record_state_guard_rejection(op);
            return Err(ServiceError::InvalidTransition(format!(
                "fee obligation {} belongs to a CLOSED period",
                obligation.id
            )));
        }
        Ok(())
    }

    /// Joins households and periods onto a page of obligations.
    async fn decorate(
        &self,
        models: Vec<fee_obligation::Model>,
    ) -> Result<Vec<FeeObligationView>, ServiceError> {
        if models.is_empty() {
            return Ok(Vec::new());
        }
        let db = &*self.db_pool;

        let mut household_ids: Vec<Uuid> = models.iter().map(|m| m.household_id).collect();
        household_ids.sort();
        household_ids.dedup();
        let households: HashMap<Uuid, household::Model> = household::Entity::find()
            .filter(household::Column::Id.is_in(household_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|h| (h.id, h))
            .collect();

        let mut period_ids: Vec<Uuid> = models.iter().map(|m| m.fee_period_id).collect();
        period_ids.sort();
        period_ids.dedup();
        let periods: HashMap<Uuid, FeePeriodStatus> = fee_period::Entity::find()
            .filter(fee_period::Column::Id.is_in(period_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.id, p.status))
            .collect();

        Ok(models
            .into_iter()
            .map(|m| {
                let household = households.get(&m.household_id);
                let period_status = periods.get(&m.fee_period_id).copied();
                FeeObligationView::build(m, household, period_status)
            })
            .collect())
    }
}
