use crate::{
    commands::{
        fee_periods::{CloseFeePeriodCommand, GenerateObligationsCommand, GenerateObligationsResult},
        Command,
    },
    db::DbPool,
    entities::fee_period::{self, FeePeriodStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
};
use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn validate_date_range(input: &CreateFeePeriodRequest) -> Result<(), ValidationError> {
    if input.start_date > input.end_date {
        return Err(ValidationError::new("start_date must not be after end_date"));
    }
    Ok(())
}

fn validate_update_range(input: &UpdateFeePeriodRequest) -> Result<(), ValidationError> {
    if let (Some(start), Some(end)) = (input.start_date, input.end_date) {
        if start > end {
            return Err(ValidationError::new("start_date must not be after end_date"));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_date_range"))]
#[schema(example = json!({
    "name": "12/2025",
    "start_date": "2025-12-01",
    "end_date": "2025-12-31"
}))]
pub struct CreateFeePeriodRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_update_range"))]
pub struct UpdateFeePeriodRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Billing period catalog plus the lifecycle transitions.
#[derive(Clone)]
pub struct FeePeriodService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl FeePeriodService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Lists periods, newest start date first.
    #[instrument(skip(self))]
    pub async fn list_fee_periods(
        &self,
        status: Option<FeePeriodStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<fee_period::Model>, u64), ServiceError> {
        let mut query = fee_period::Entity::find();
        if let Some(status) = status {
            query = query.filter(fee_period::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_desc(fee_period::Column::StartDate)
            .order_by_desc(fee_period::Column::CreatedAt)
            .paginate(&*self.db_pool, limit);

        let total = paginator.num_items().await?;
        let periods = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((periods, total))
    }

    #[instrument(skip(self))]
    pub async fn get_fee_period(
        &self,
        id: &Uuid,
    ) -> Result<Option<fee_period::Model>, ServiceError> {
        Ok(fee_period::Entity::find_by_id(*id)
            .one(&*self.db_pool)
            .await?)
    }

    /// The period operators are working in: latest OPEN, else latest DRAFT,
    /// else latest CLOSED.
    #[instrument(skip(self))]
    pub async fn current_fee_period(&self) -> Result<Option<fee_period::Model>, ServiceError> {
        for status in [
            FeePeriodStatus::Open,
            FeePeriodStatus::Draft,
            FeePeriodStatus::Closed,
        ] {
            let found = fee_period::Entity::find()
                .filter(fee_period::Column::Status.eq(status))
                .order_by_desc(fee_period::Column::StartDate)
                .one(&*self.db_pool)
                .await?;
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    /// Creates a period in DRAFT. Overlapping date ranges are allowed.
    #[instrument(skip(self))]
    pub async fn create_fee_period(
        &self,
        request: CreateFeePeriodRequest,
    ) -> Result<fee_period::Model, ServiceError> {
        request.validate()?;

        let period = fee_period::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            status: Set(FeePeriodStatus::Draft),
            start_date: Set(request.start_date),
            end_date: Set(request.end_date),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;

        info!(period_id = %period.id, name = %period.name, "Fee period created");
        self.event_sender
            .send_or_log(Event::FeePeriodCreated {
                period_id: period.id,
                name: period.name.clone(),
            })
            .await;

        Ok(period)
    }

    /// Renames or re-dates a DRAFT period.
    #[instrument(skip(self))]
    pub async fn update_fee_period(
        &self,
        id: Uuid,
        request: UpdateFeePeriodRequest,
    ) -> Result<fee_period::Model, ServiceError> {
        request.validate()?;

        let existing = self
            .get_fee_period(&id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Fee period", id))?;

        if !existing.status.is_editable() {
            metrics::record_state_guard_rejection("update_period");
            return Err(ServiceError::InvalidTransition(format!(
                "fee period {} is {}, only DRAFT periods can be edited",
                id, existing.status
            )));
        }

        let start = request.start_date.unwrap_or(existing.start_date);
        let end = request.end_date.unwrap_or(existing.end_date);
        if start > end {
            return Err(ServiceError::ValidationError(
                "start_date must not be after end_date".to_string(),
            ));
        }

        let mut active: fee_period::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        active.start_date = Set(start);
        active.end_date = Set(end);

        Ok(active.update(&*self.db_pool).await?)
    }

    /// Deletes a DRAFT period together with any manually added obligations.
    #[instrument(skip(self))]
    pub async fn delete_fee_period(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = fee_period::Entity::delete_many()
            .filter(fee_period::Column::Id.eq(id))
            .filter(fee_period::Column::Status.eq(FeePeriodStatus::Draft))
            .exec(&*self.db_pool)
            .await?;

        if result.rows_affected == 0 {
            let existing = self
                .get_fee_period(&id)
                .await?
                .ok_or_else(|| ServiceError::not_found("Fee period", id))?;
            metrics::record_state_guard_rejection("delete_period");
            return Err(ServiceError::InvalidTransition(format!(
                "fee period {} is {}, only DRAFT periods can be deleted",
                id, existing.status
            )));
        }

        info!(period_id = %id, "Fee period deleted");
        Ok(())
    }

    /// DRAFT -> OPEN with obligation fan-out.
    #[instrument(skip(self))]
    pub async fn generate_obligations(
        &self,
        period_id: Uuid,
    ) -> Result<GenerateObligationsResult, ServiceError> {
        GenerateObligationsCommand { period_id }
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// OPEN -> CLOSED.
    #[instrument(skip(self))]
    pub async fn close_fee_period(
        &self,
        period_id: Uuid,
    ) -> Result<fee_period::Model, ServiceError> {
        CloseFeePeriodCommand { period_id }
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        commands::fee_periods::{SkipReason, SkippedObligation},
        entities::{fee_item::FeeUnit, fee_obligation, household::HouseholdStatus},
        services::{
            fee_obligations::{CreateFeeObligationRequest, FeeObligationService},
            test_support,
        },
    };
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};

    fn december() -> CreateFeePeriodRequest {
        CreateFeePeriodRequest {
            name: "12/2025".to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
        }
    }

    async fn service() -> FeePeriodService {
        FeePeriodService::new(test_support::setup_db().await, test_support::event_sender())
    }

    #[tokio::test]
    async fn new_periods_start_in_draft() {
        let svc = service().await;
        let period = svc.create_fee_period(december()).await.unwrap();
        assert_eq!(period.status, FeePeriodStatus::Draft);
        assert_eq!(period.name, "12/2025");
    }

    #[tokio::test]
    async fn inverted_date_range_is_rejected() {
        let svc = service().await;
        let mut request = december();
        request.end_date = NaiveDate::from_ymd_opt(2025, 11, 30).unwrap();
        assert_matches!(
            svc.create_fee_period(request).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let svc = service().await;
        let mut request = december();
        request.name = String::new();
        assert_matches!(
            svc.create_fee_period(request).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn closing_twice_is_a_state_guard_error() {
        let svc = service().await;
        let period = svc.create_fee_period(december()).await.unwrap();

        svc.generate_obligations(period.id).await.unwrap();
        let closed = svc.close_fee_period(period.id).await.unwrap();
        assert_eq!(closed.status, FeePeriodStatus::Closed);

        assert_matches!(
            svc.close_fee_period(period.id).await,
            Err(ServiceError::InvalidTransition(_))
        );
        let reloaded = svc.get_fee_period(&period.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, FeePeriodStatus::Closed);
    }

    #[tokio::test]
    async fn closing_a_draft_is_rejected() {
        let svc = service().await;
        let period = svc.create_fee_period(december()).await.unwrap();
        assert_matches!(
            svc.close_fee_period(period.id).await,
            Err(ServiceError::InvalidTransition(_))
        );
    }

    #[tokio::test]
    async fn missing_period_is_not_found() {
        let svc = service().await;
        assert_matches!(
            svc.generate_obligations(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        );
        assert_matches!(
            svc.close_fee_period(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn generating_twice_does_not_duplicate_obligations() {
        let db = test_support::setup_db().await;
        let svc = FeePeriodService::new(db.clone(), test_support::event_sender());

        let apt = test_support::apartment(&db, "1203", Some(dec!(75))).await;
        test_support::household(&db, "HK001", Some(apt.id), HouseholdStatus::Active).await;
        test_support::fee_item(&db, "Phí dịch vụ", FeeUnit::M2, dec!(7000)).await;

        let period = svc.create_fee_period(december()).await.unwrap();
        let first = svc.generate_obligations(period.id).await.unwrap();
        assert_eq!(first.obligations_created, 1);
        assert_eq!(first.total_expected, dec!(525000));
        assert_eq!(first.period.status, FeePeriodStatus::Open);

        assert_matches!(
            svc.generate_obligations(period.id).await,
            Err(ServiceError::InvalidTransition(_))
        );

        let count = fee_obligation::Entity::find()
            .filter(fee_obligation::Column::FeePeriodId.eq(period.id))
            .count(&*db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn concurrent_generate_has_exactly_one_winner() {
        let db = test_support::setup_db().await;
        let svc = FeePeriodService::new(db.clone(), test_support::event_sender());

        let apt = test_support::apartment(&db, "0801", Some(dec!(60))).await;
        test_support::household(&db, "HK002", Some(apt.id), HouseholdStatus::Active).await;
        test_support::fee_item(&db, "Phí quản lý", FeeUnit::Fixed, dec!(100000)).await;
        let period = svc.create_fee_period(december()).await.unwrap();

        let (a, b) = tokio::join!(
            svc.generate_obligations(period.id),
            svc.generate_obligations(period.id)
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);

        let count = fee_obligation::Entity::find()
            .filter(fee_obligation::Column::FeePeriodId.eq(period.id))
            .count(&*db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn manual_obligation_on_a_draft_is_kept_by_generation() {
        let db = test_support::setup_db().await;
        let events = test_support::event_sender();
        let svc = FeePeriodService::new(db.clone(), events.clone());
        let obligations = FeeObligationService::new(db.clone(), events);

        let apt = test_support::apartment(&db, "0302", Some(dec!(80))).await;
        let household =
            test_support::household(&db, "HK003", Some(apt.id), HouseholdStatus::Active).await;
        let service_fee = test_support::fee_item(&db, "Phí dịch vụ", FeeUnit::M2, dec!(7000)).await;
        let cleaning =
            test_support::fee_item(&db, "Phí vệ sinh", FeeUnit::Fixed, dec!(30000)).await;
        let period = svc.create_fee_period(december()).await.unwrap();

        let manual = obligations
            .create_fee_obligation(CreateFeeObligationRequest {
                household_id: household.id,
                fee_item_id: cleaning.id,
                fee_period_id: period.id,
                expected_amount: Some(dec!(15000)),
                due_date: None,
                note: Some("Giảm 50%".to_string()),
            })
            .await
            .unwrap();

        let result = svc.generate_obligations(period.id).await.unwrap();
        assert_eq!(result.period.status, FeePeriodStatus::Open);
        assert_eq!(result.obligations_created, 1);
        assert_eq!(result.total_expected, dec!(560000));
        assert_matches!(
            result.skipped.as_slice(),
            [SkippedObligation { reason: SkipReason::AlreadyBilled, fee_item_id, .. }]
                if *fee_item_id == cleaning.id
        );

        let rows = fee_obligation::Entity::find()
            .filter(fee_obligation::Column::FeePeriodId.eq(period.id))
            .all(&*db)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        let kept = rows.iter().find(|r| r.fee_item_id == cleaning.id).unwrap();
        assert_eq!(kept.id, manual.id);
        assert_eq!(kept.expected_amount, dec!(15000));
        assert!(rows.iter().any(|r| r.fee_item_id == service_fee.id));
    }

    #[tokio::test]
    async fn failed_insert_rolls_back_the_whole_generation() {
        let db = test_support::setup_db().await;
        let svc = FeePeriodService::new(db.clone(), test_support::event_sender());

        // 30 households x 2 items spans two insert batches.
        for i in 0..30 {
            test_support::household(&db, &format!("HK{:03}", i), None, HouseholdStatus::Active)
                .await;
        }
        test_support::fee_item(&db, "Phí quản lý", FeeUnit::Fixed, dec!(100000)).await;
        test_support::fee_item(&db, "Phí vệ sinh", FeeUnit::Fixed, dec!(30000)).await;
        let period = svc.create_fee_period(december()).await.unwrap();

        // Rows are inserted in household code order, so HK029 lands in the last batch.
        db.execute_unprepared(
            "CREATE TRIGGER refuse_hk029 BEFORE INSERT ON fee_obligations \
             WHEN (SELECT household_code FROM households \
             WHERE id = NEW.household_id) = 'HK029' \
             BEGIN SELECT RAISE(ABORT, 'refused'); END",
        )
        .await
        .unwrap();

        assert!(svc.generate_obligations(period.id).await.is_err());

        let reloaded = svc.get_fee_period(&period.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, FeePeriodStatus::Draft);
        let count = fee_obligation::Entity::find()
            .filter(fee_obligation::Column::FeePeriodId.eq(period.id))
            .count(&*db)
            .await
            .unwrap();
        assert_eq!(count, 0);

        db.execute_unprepared("DROP TRIGGER refuse_hk029").await.unwrap();
        let retried = svc.generate_obligations(period.id).await.unwrap();
        assert_eq!(retried.obligations_created, 60);
    }

    #[tokio::test]
    async fn empty_catalog_still_opens_the_period() {
        let svc = service().await;
        let period = svc.create_fee_period(december()).await.unwrap();
        let result = svc.generate_obligations(period.id).await.unwrap();
        assert_eq!(result.obligations_created, 0);
        assert_eq!(result.period.status, FeePeriodStatus::Open);
    }

    #[tokio::test]
    async fn only_draft_periods_are_editable_and_deletable() {
        let svc = service().await;
        let period = svc.create_fee_period(december()).await.unwrap();

        let renamed = svc
            .update_fee_period(
                period.id,
                UpdateFeePeriodRequest {
                    name: Some("T12/2025".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "T12/2025");

        svc.generate_obligations(period.id).await.unwrap();
        assert_matches!(
            svc.update_fee_period(period.id, UpdateFeePeriodRequest::default())
                .await,
            Err(ServiceError::InvalidTransition(_))
        );
        assert_matches!(
            svc.delete_fee_period(period.id).await,
            Err(ServiceError::InvalidTransition(_))
        );

        let draft = svc.create_fee_period(december()).await.unwrap();
        svc.delete_fee_period(draft.id).await.unwrap();
        assert!(svc.get_fee_period(&draft.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn current_period_prefers_open_over_newer_draft() {
        let svc = service().await;
        let november = svc
            .create_fee_period(CreateFeePeriodRequest {
                name: "11/2025".to_string(),
                start_date: NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2025, 11, 30).unwrap(),
            })
            .await
            .unwrap();
        svc.create_fee_period(december()).await.unwrap();
        svc.generate_obligations(november.id).await.unwrap();

        let current = svc.current_fee_period().await.unwrap().unwrap();
        assert_eq!(current.id, november.id);
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let svc = service().await;
        let open = svc.create_fee_period(december()).await.unwrap();
        svc.create_fee_period(december()).await.unwrap();
        svc.generate_obligations(open.id).await.unwrap();

        let (drafts, total) = svc
            .list_fee_periods(Some(FeePeriodStatus::Draft), 1, 20)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert!(drafts.iter().all(|p| p.status == FeePeriodStatus::Draft));

        let (_, all) = svc.list_fee_periods(None, 1, 20).await.unwrap();
        assert_eq!(all, 2);
    }
}
