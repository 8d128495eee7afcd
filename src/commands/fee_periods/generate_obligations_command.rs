use crate::{
    commands::{transaction_error, Command},
    db::DbPool,
    entities::{
        apartment,
        fee_item::{self, FeeItemStatus, FeeUnit},
        fee_obligation,
        fee_period::{self, FeePeriodStatus},
        household::{self, HouseholdStatus},
        vehicle::{self, VehicleStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Rows per INSERT; keeps bind parameters under SQLite's limit.
const INSERT_CHUNK: usize = 50;

/// Fans a DRAFT period out into one obligation per billable household and
/// applicable fee item, then opens the period. All or nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateObligationsCommand {
    pub period_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerateObligationsResult {
    pub period: fee_period::Model,
    pub obligations_created: usize,
    pub total_expected: Decimal,
    pub skipped: Vec<SkippedObligation>,
}

/// Billing-relevant snapshot of one household.
#[derive(Debug, Clone, PartialEq)]
pub struct BillableHousehold {
    pub id: Uuid,
    pub household_code: String,
    pub area: Option<Decimal>,
    pub active_vehicles: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedObligation {
    pub household_id: Uuid,
    pub fee_item_id: Uuid,
    pub fee_item_name: String,
    pub expected_amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Per-m2 fee but the apartment has no recorded area
    MissingArea,
    /// Per-slot fee but the household has no active vehicle
    NoVehicles,
    /// Multiplier present but zero
    ZeroMultiplier,
    /// An obligation for the pair was already added to the period by hand
    AlreadyBilled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SkippedObligation {
    pub household_id: Uuid,
    pub household_code: String,
    pub fee_item_id: Uuid,
    pub fee_item_name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct GenerationPlan {
    pub obligations: Vec<PlannedObligation>,
    pub skipped: Vec<SkippedObligation>,
}

impl GenerationPlan {
    pub fn total_expected(&self) -> Decimal {
        self.obligations.iter().map(|o| o.expected_amount).sum()
    }
}

/// `trunc(cost × multiplier)` for one household, or why the pair is not billed.
///
/// M2 scales by apartment area, SLOT by active vehicle count, FIXED is flat.
pub fn compute_expected_amount(
    cost: Decimal,
    unit: FeeUnit,
    area: Option<Decimal>,
    active_vehicles: u32,
) -> Result<Decimal, SkipReason> {
    let multiplier = match unit {
        FeeUnit::M2 => area.ok_or(SkipReason::MissingArea)?,
        FeeUnit::Slot => {
            if active_vehicles == 0 {
                return Err(SkipReason::NoVehicles);
            }
            Decimal::from(active_vehicles)
        }
        FeeUnit::Fixed => Decimal::ONE,
    };

    if multiplier <= Decimal::ZERO {
        return Err(SkipReason::ZeroMultiplier);
    }

    Ok((cost * multiplier).trunc())
}

/// Pure fan-out over a household snapshot and the active fee catalog.
///
/// `already_billed` holds `(household_id, fee_item_id)` pairs the period
/// already carries; those are reported as skipped instead of planned.
pub fn plan_obligations(
    households: &[BillableHousehold],
    items: &[fee_item::Model],
    already_billed: &HashSet<(Uuid, Uuid)>,
) -> GenerationPlan {
    let mut plan = GenerationPlan::default();

    for household in households {
        for item in items {
            let amount = if already_billed.contains(&(household.id, item.id)) {
                Err(SkipReason::AlreadyBilled)
            } else {
                compute_expected_amount(
                    item.cost,
                    item.unit,
                    household.area,
                    household.active_vehicles,
                )
            };
            match amount {
                Ok(expected_amount) => plan.obligations.push(PlannedObligation {
                    household_id: household.id,
                    fee_item_id: item.id,
                    fee_item_name: item.name.clone(),
                    expected_amount,
                }),
                Err(reason) => plan.skipped.push(SkippedObligation {
                    household_id: household.id,
                    household_code: household.household_code.clone(),
                    fee_item_id: item.id,
                    fee_item_name: item.name.clone(),
                    reason,
                }),
            }
        }
    }

    plan
}

#[async_trait::async_trait]
impl Command for GenerateObligationsCommand {
    type Result = GenerateObligationsResult;

    #[instrument(skip(self, db_pool, event_sender), fields(period_id = %self.period_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let period_id = self.period_id;

        let result = db_pool
            .transaction::<_, GenerateObligationsResult, ServiceError>(move |txn| {
                Box::pin(async move { Self::generate_in_txn(period_id, txn).await })
            })
            .await
            .map_err(transaction_error)
            .map_err(|e| {
                if matches!(e, ServiceError::InvalidTransition(_)) {
                    metrics::record_state_guard_rejection("generate");
                }
                e
            })?;

        metrics::FEE_PERIODS_GENERATED.inc();
        metrics::OBLIGATIONS_CREATED.inc_by(result.obligations_created as u64);

        for skipped in &result.skipped {
            warn!(
                household_code = %skipped.household_code,
                fee_item = %skipped.fee_item_name,
                reason = ?skipped.reason,
                "Household not billed for fee item"
            );
        }
        info!(
            obligations = result.obligations_created,
            total_expected = %result.total_expected,
            skipped = result.skipped.len(),
            "Fee period opened"
        );

        event_sender
            .send_or_log(Event::ObligationsGenerated {
                period_id,
                count: result.obligations_created,
                total_expected: result.total_expected,
            })
            .await;

        Ok(result)
    }
}

impl GenerateObligationsCommand {
    async fn generate_in_txn(
        period_id: Uuid,
        txn: &DatabaseTransaction,
    ) -> Result<GenerateObligationsResult, ServiceError> {
        // The DRAFT -> OPEN compare-and-set is the serialization point:
        // a second caller sees zero affected rows and backs off.
        let opened = fee_period::Entity::update_many()
            .col_expr(fee_period::Column::Status, Expr::value(FeePeriodStatus::Open))
            .col_expr(fee_period::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(fee_period::Column::Id.eq(period_id))
            .filter(fee_period::Column::Status.eq(FeePeriodStatus::Draft))
            .exec(txn)
            .await?;

        if opened.rows_affected == 0 {
            return Err(match fee_period::Entity::find_by_id(period_id).one(txn).await? {
                None => ServiceError::not_found("Fee period", period_id),
                Some(period) => ServiceError::InvalidTransition(format!(
                    "fee period {} is {}, generation requires DRAFT",
                    period_id, period.status
                )),
            });
        }

        let period = fee_period::Entity::find_by_id(period_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Fee period", period_id))?;

        let households = load_billable_households(txn).await?;
        let items = fee_item::Entity::find()
            .filter(fee_item::Column::Status.eq(FeeItemStatus::Active))
            .order_by_asc(fee_item::Column::Name)
            .all(txn)
            .await?;

        let already_billed: HashSet<(Uuid, Uuid)> = fee_obligation::Entity::find()
            .filter(fee_obligation::Column::FeePeriodId.eq(period.id))
            .all(txn)
            .await?
            .into_iter()
            .map(|o| (o.household_id, o.fee_item_id))
            .collect();

        let plan = plan_obligations(&households, &items, &already_billed);
        let total_expected = plan.total_expected();
        let now = Utc::now();

        let rows: Vec<fee_obligation::ActiveModel> = plan
            .obligations
            .iter()
            .map(|planned| fee_obligation::ActiveModel {
                id: Set(Uuid::new_v4()),
                household_id: Set(planned.household_id),
                fee_item_id: Set(planned.fee_item_id),
                fee_item_name: Set(planned.fee_item_name.clone()),
                fee_period_id: Set(period.id),
                period_label: Set(period.name.clone()),
                expected_amount: Set(planned.expected_amount),
                paid_amount: Set(Decimal::ZERO),
                due_date: Set(period.end_date),
                payer_name: Set(None),
                paid_at: Set(None),
                payment_method: Set(None),
                note: Set(None),
                version: Set(0),
                created_at: Set(now),
                updated_at: Set(Some(now)),
            })
            .collect();

        let mut remaining = rows;
        while !remaining.is_empty() {
            let rest = remaining.split_off(remaining.len().min(INSERT_CHUNK));
            fee_obligation::Entity::insert_many(remaining)
                .exec_without_returning(txn)
                .await?;
            remaining = rest;
        }

        Ok(GenerateObligationsResult {
            period,
            obligations_created: plan.obligations.len(),
            total_expected,
            skipped: plan.skipped,
        })
    }
}

/// ACTIVE households with their apartment area and active vehicle count,
/// ordered by household code.
async fn load_billable_households(
    txn: &DatabaseTransaction,
) -> Result<Vec<BillableHousehold>, ServiceError> {
    let households = household::Entity::find()
        .filter(household::Column::Status.eq(HouseholdStatus::Active))
        .order_by_asc(household::Column::HouseholdCode)
        .all(txn)
        .await?;

    if households.is_empty() {
        return Ok(Vec::new());
    }

    let apartment_ids: Vec<Uuid> = households.iter().filter_map(|h| h.apartment_id).collect();
    let areas: HashMap<Uuid, Option<Decimal>> = if apartment_ids.is_empty() {
        HashMap::new()
    } else {
        apartment::Entity::find()
            .filter(apartment::Column::Id.is_in(apartment_ids))
            .all(txn)
            .await?
            .into_iter()
            .map(|a| (a.id, a.area))
            .collect()
    };

    let household_ids: Vec<Uuid> = households.iter().map(|h| h.id).collect();
    let mut vehicle_counts: HashMap<Uuid, u32> = HashMap::new();
    for v in vehicle::Entity::find()
        .filter(vehicle::Column::Status.eq(VehicleStatus::Active))
        .filter(vehicle::Column::HouseholdId.is_in(household_ids))
        .all(txn)
        .await?
    {
        *vehicle_counts.entry(v.household_id).or_default() += 1;
    }

    Ok(households
        .into_iter()
        .map(|h| BillableHousehold {
            area: h.apartment_id.and_then(|id| areas.get(&id).copied().flatten()),
            active_vehicles: vehicle_counts.get(&h.id).copied().unwrap_or(0),
            id: h.id,
            household_code: h.household_code,
        })
        .collect())
}
