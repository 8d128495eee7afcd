use crate::{
    db::DbPool,
    entities::{
        apartment, fee_item, fee_obligation,
        fee_period::{self, FeePeriodStatus},
        household::{self, HouseholdStatus},
        resident::{self, ResidentStatus},
    },
    errors::ServiceError,
};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// How many periods the analytics view looks back over.
pub const ANALYTICS_WINDOW: u64 = 5;

/// Collected over expected as a percentage with one decimal place.
///
/// Zero when nothing is expected, so the result is always finite.
pub fn collection_rate(expected: Decimal, collected: Decimal) -> f64 {
    if expected <= Decimal::ZERO {
        return 0.0;
    }
    collected
        .checked_div(expected)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|pct| pct.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|pct| pct.to_f64())
        .unwrap_or(0.0)
}

/// Receivable and collected amounts for one household in one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "household_id": "a3d8f1a2-1b4c-4d5e-8f9a-0b1c2d3e4f50",
    "household_code": "HK001",
    "owner_name": "Nguyễn Văn An",
    "apartment": "A-12-1203",
    "total_receivable": "625000",
    "total_paid": "562500",
    "payment_rate": 90.0
}))]
pub struct HouseholdPaymentStats {
    pub household_id: Uuid,
    pub household_code: String,
    pub owner_name: String,
    pub apartment: Option<String>,
    pub total_receivable: Decimal,
    pub total_paid: Decimal,
    pub payment_rate: f64,
}

impl HouseholdPaymentStats {
    /// Exact paid/receivable ratio used for ranking.
    fn ratio(&self) -> Decimal {
        if self.total_receivable <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.total_paid
            .checked_div(self.total_receivable)
            .unwrap_or(Decimal::ZERO)
    }
}

/// Groups obligations per household. Households missing from `households`
/// are reported under their id.
pub fn household_payment_stats(
    obligations: &[fee_obligation::Model],
    households: &HashMap<Uuid, household::Model>,
    apartments: &HashMap<Uuid, apartment::Model>,
) -> Vec<HouseholdPaymentStats> {
    let mut totals: BTreeMap<Uuid, (Decimal, Decimal)> = BTreeMap::new();
    for obligation in obligations {
        let entry = totals
            .entry(obligation.household_id)
            .or_insert((Decimal::ZERO, Decimal::ZERO));
        entry.0 += obligation.expected_amount;
        entry.1 += obligation.paid_amount;
    }

    let mut stats: Vec<HouseholdPaymentStats> = totals
        .into_iter()
        .map(|(household_id, (expected, paid))| {
            let household = households.get(&household_id);
            let apartment = household
                .and_then(|h| h.apartment_id)
                .and_then(|id| apartments.get(&id))
                .map(|a| format!("{}-{}-{}", a.block, a.floor, a.unit));
            HouseholdPaymentStats {
                household_id,
                household_code: household
                    .map(|h| h.household_code.clone())
                    .unwrap_or_else(|| household_id.to_string()),
                owner_name: household.map(|h| h.owner_name.clone()).unwrap_or_default(),
                apartment,
                total_receivable: expected,
                total_paid: paid,
                payment_rate: collection_rate(expected, paid),
            }
        })
        .collect();

    stats.sort_by(|a, b| a.household_code.cmp(&b.household_code));
    stats
}

/// Best and worst payer by payment rate.
///
/// Ties are broken by household code ascending; households with nothing
/// receivable are not ranked.
pub fn best_and_worst(
    stats: &[HouseholdPaymentStats],
) -> Option<(HouseholdPaymentStats, HouseholdPaymentStats)> {
    let mut ranked: Vec<&HouseholdPaymentStats> = stats
        .iter()
        .filter(|s| s.total_receivable > Decimal::ZERO)
        .collect();
    ranked.sort_by(|a, b| match b.ratio().cmp(&a.ratio()) {
        Ordering::Equal => a.household_code.cmp(&b.household_code),
        other => other,
    });

    let best = ranked.first()?;
    let worst = ranked.last()?;
    Some(((*best).clone(), (*worst).clone()))
}

lazy_static! {
    static ref YEAR_MONTH: Regex = Regex::new(r"^(\d{4})-(\d{1,2})$").expect("valid regex");
    static ref PERIOD_NAME: Regex = Regex::new(r"^[Tt]?(\d{1,2})/(\d{4})$").expect("valid regex");
}

/// Period names a `YYYY-MM`, `MM/YYYY` or `TMM/YYYY` selector may refer to.
pub fn period_name_candidates(selector: &str) -> Result<Vec<String>, ServiceError> {
    let selector = selector.trim();
    let invalid = || {
        ServiceError::ValidationError(format!(
            "periodYm must look like YYYY-MM or MM/YYYY, got '{}'",
            selector
        ))
    };

    let (year, month) = if let Some(captures) = YEAR_MONTH.captures(selector) {
        (captures[1].to_string(), captures[2].to_string())
    } else if let Some(captures) = PERIOD_NAME.captures(selector) {
        (captures[2].to_string(), captures[1].to_string())
    } else {
        return Err(invalid());
    };
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }

    Ok(vec![
        format!("{:02}/{}", month, year),
        format!("T{:02}/{}", month, year),
        format!("T{}/{}", month, year),
    ])
}

/// Which obligations a summary covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryScope {
    All,
    Period(Uuid),
    /// `YYYY-MM`, `MM/YYYY` or `TMM/YYYY`
    YearMonth(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "period_id": "8b9c0d1e-2f3a-4b5c-9d6e-7f8a9b0c1d2e",
    "period_name": "12/2025",
    "total_households": 120,
    "total_persons": 356,
    "active_residents": 340,
    "temporary_absent_residents": 16,
    "total_fees": 5,
    "total_receivable": "84500000",
    "total_collected": "61200000",
    "collection_rate": 72.4
}))]
pub struct ReportSummary {
    pub period_id: Option<Uuid>,
    pub period_name: Option<String>,
    pub total_households: u64,
    pub total_persons: u64,
    pub active_residents: u64,
    pub temporary_absent_residents: u64,
    pub total_fees: u64,
    pub total_receivable: Decimal,
    pub total_collected: Decimal,
    pub collection_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PeriodStat {
    pub period_id: Uuid,
    pub period_name: String,
    pub status: FeePeriodStatus,
    pub total_receivable: Decimal,
    pub total_collected: Decimal,
    pub collection_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DashboardAnalytics {
    /// Oldest first
    pub last_periods: Vec<PeriodStat>,
    pub previous_period_name: Option<String>,
    pub best_paying_household: Option<HouseholdPaymentStats>,
    pub worst_paying_household: Option<HouseholdPaymentStats>,
}

/// Sums expected and paid amounts of obligations matching `condition`.
pub(crate) async fn sum_amounts<C: ConnectionTrait>(
    db: &C,
    condition: Condition,
) -> Result<(Decimal, Decimal), ServiceError> {
    let rows: Vec<(Decimal, Decimal)> = fee_obligation::Entity::find()
        .select_only()
        .column(fee_obligation::Column::ExpectedAmount)
        .column(fee_obligation::Column::PaidAmount)
        .filter(condition)
        .into_tuple()
        .all(db)
        .await?;

    Ok(rows.into_iter().fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(expected, paid), (e, p)| (expected + e, paid + p),
    ))
}

/// Read-only aggregation over the obligation ledger.
#[derive(Clone)]
pub struct ReportService {
    db_pool: Arc<DbPool>,
}

impl ReportService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn summary(&self, scope: SummaryScope) -> Result<ReportSummary, ServiceError> {
        let db = &*self.db_pool;

        let period = match &scope {
            SummaryScope::All => None,
            SummaryScope::Period(id) => Some(
                fee_period::Entity::find_by_id(*id)
                    .one(db)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Fee period", id))?,
            ),
            SummaryScope::YearMonth(selector) => {
                let names = period_name_candidates(selector)?;
                fee_period::Entity::find()
                    .filter(fee_period::Column::Name.is_in(names))
                    .order_by_desc(fee_period::Column::StartDate)
                    .one(db)
                    .await?
            }
        };

        let (total_receivable, total_collected) = match (&scope, &period) {
            (SummaryScope::All, _) => sum_amounts(db, Condition::all()).await?,
            (_, Some(p)) => {
                sum_amounts(
                    db,
                    Condition::all().add(fee_obligation::Column::FeePeriodId.eq(p.id)),
                )
                .await?
            }
            (_, None) => {
                debug!(?scope, "No fee period matches the report selector");
                (Decimal::ZERO, Decimal::ZERO)
            }
        };

        let total_households = household::Entity::find()
            .filter(household::Column::Status.eq(HouseholdStatus::Active))
            .count(db)
            .await?;
        let total_persons = resident::Entity::find().count(db).await?;
        let active_residents = resident::Entity::find()
            .filter(resident::Column::Status.eq(ResidentStatus::Active))
            .count(db)
            .await?;
        let temporary_absent_residents = resident::Entity::find()
            .filter(resident::Column::Status.eq(ResidentStatus::Absent))
            .count(db)
            .await?;
        let total_fees = fee_item::Entity::find().count(db).await?;

        Ok(ReportSummary {
            period_id: period.as_ref().map(|p| p.id),
            period_name: period.map(|p| p.name),
            total_households,
            total_persons,
            active_residents,
            temporary_absent_residents,
            total_fees,
            total_receivable,
            total_collected,
            collection_rate: collection_rate(total_receivable, total_collected),
        })
    }

    /// Trend over the most recent periods plus best and worst payer of the
    /// previous period.
    #[instrument(skip(self))]
    pub async fn analytics(&self) -> Result<DashboardAnalytics, ServiceError> {
        let db = &*self.db_pool;

        let recent = fee_period::Entity::find()
            .order_by_desc(fee_period::Column::StartDate)
            .limit(ANALYTICS_WINDOW)
            .all(db)
            .await?;

        let mut last_periods = Vec::with_capacity(recent.len());
        for period in recent.iter().rev() {
            let (expected, collected) = sum_amounts(
                db,
                Condition::all().add(fee_obligation::Column::FeePeriodId.eq(period.id)),
            )
            .await?;
            last_periods.push(PeriodStat {
                period_id: period.id,
                period_name: period.name.clone(),
                status: period.status,
                total_receivable: expected,
                total_collected: collected,
                collection_rate: collection_rate(expected, collected),
            });
        }

        let latest_closed = fee_period::Entity::find()
            .filter(fee_period::Column::Status.eq(FeePeriodStatus::Closed))
            .order_by_desc(fee_period::Column::StartDate)
            .one(db)
            .await?;
        let previous = latest_closed
            .or_else(|| recent.get(1).cloned())
            .or_else(|| recent.first().cloned());

        let Some(previous) = previous else {
            return Ok(DashboardAnalytics {
                last_periods,
                previous_period_name: None,
                best_paying_household: None,
                worst_paying_household: None,
            });
        };

        let stats = self.household_stats_for_period(previous.id).await?;
        let ranked = best_and_worst(&stats);

        Ok(DashboardAnalytics {
            last_periods,
            previous_period_name: Some(previous.name),
            best_paying_household: ranked.as_ref().map(|(best, _)| best.clone()),
            worst_paying_household: ranked.map(|(_, worst)| worst),
        })
    }

    /// Per-household totals for one period.
    #[instrument(skip(self))]
    pub async fn household_stats_for_period(
        &self,
        period_id: Uuid,
    ) -> Result<Vec<HouseholdPaymentStats>, ServiceError> {
        let db = &*self.db_pool;

        let obligations = fee_obligation::Entity::find()
            .filter(fee_obligation::Column::FeePeriodId.eq(period_id))
            .all(db)
            .await?;
        if obligations.is_empty() {
            return Ok(Vec::new());
        }

        let mut household_ids: Vec<Uuid> = obligations.iter().map(|o| o.household_id).collect();
        household_ids.sort();
        household_ids.dedup();
        let households: HashMap<Uuid, household::Model> = household::Entity::find()
            .filter(household::Column::Id.is_in(household_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|h| (h.id, h))
            .collect();

        let apartment_ids: Vec<Uuid> = households.values().filter_map(|h| h.apartment_id).collect();
        let apartments: HashMap<Uuid, apartment::Model> = if apartment_ids.is_empty() {
            HashMap::new()
        } else {
            apartment::Entity::find()
                .filter(apartment::Column::Id.is_in(apartment_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|a| (a.id, a))
                .collect()
        };

        Ok(household_payment_stats(&obligations, &households, &apartments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn stat(code: &str, expected: Decimal, paid: Decimal) -> HouseholdPaymentStats {
        HouseholdPaymentStats {
            household_id: Uuid::new_v4(),
            household_code: code.to_string(),
            owner_name: String::new(),
            apartment: None,
            total_receivable: expected,
            total_paid: paid,
            payment_rate: collection_rate(expected, paid),
        }
    }

    fn obligation(household_id: Uuid, expected: Decimal, paid: Decimal) -> fee_obligation::Model {
        fee_obligation::Model {
            id: Uuid::new_v4(),
            household_id,
            fee_item_id: Uuid::new_v4(),
            fee_item_name: "Phí dịch vụ".to_string(),
            fee_period_id: Uuid::nil(),
            period_label: "12/2025".to_string(),
            expected_amount: expected,
            paid_amount: paid,
            due_date: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            payer_name: None,
            paid_at: None,
            payment_method: None,
            note: None,
            version: 0,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[rstest]
    #[case(dec!(0), dec!(0), 0.0)]
    #[case(dec!(0), dec!(50000), 0.0)]
    #[case(dec!(100000), dec!(0), 0.0)]
    #[case(dec!(100000), dec!(50000), 50.0)]
    #[case(dec!(100000), dec!(100000), 100.0)]
    #[case(dec!(3), dec!(2), 66.7)]
    #[case(dec!(3), dec!(1), 33.3)]
    #[case(dec!(8), dec!(1), 12.5)]
    fn collection_rate_cases(
        #[case] expected: Decimal,
        #[case] collected: Decimal,
        #[case] rate: f64,
    ) {
        assert!((collection_rate(expected, collected) - rate).abs() < 1e-9);
    }

    #[test]
    fn zero_expected_never_yields_nan() {
        let rate = collection_rate(Decimal::ZERO, Decimal::ZERO);
        assert!(rate.is_finite());
        assert_eq!(rate, 0.0);
    }

    #[test]
    fn best_and_worst_by_payment_rate() {
        let stats = vec![
            stat("H2", dec!(100), dec!(20)),
            stat("H1", dec!(100), dec!(90)),
        ];
        let (best, worst) = best_and_worst(&stats).unwrap();
        assert_eq!(best.household_code, "H1");
        assert_eq!(worst.household_code, "H2");
        assert_eq!(best.payment_rate, 90.0);
        assert_eq!(worst.payment_rate, 20.0);
    }

    #[test]
    fn ties_break_by_household_code() {
        let stats = vec![
            stat("HK003", dec!(200), dec!(100)),
            stat("HK001", dec!(100), dec!(50)),
            stat("HK002", dec!(100), dec!(50)),
        ];
        let (best, worst) = best_and_worst(&stats).unwrap();
        assert_eq!(best.household_code, "HK001");
        assert_eq!(worst.household_code, "HK003");
    }

    #[test]
    fn households_with_nothing_receivable_are_not_ranked() {
        let stats = vec![stat("HK001", dec!(0), dec!(0)), stat("HK002", dec!(100), dec!(10))];
        let (best, worst) = best_and_worst(&stats).unwrap();
        assert_eq!(best.household_code, "HK002");
        assert_eq!(worst.household_code, "HK002");

        assert!(best_and_worst(&[stat("HK001", dec!(0), dec!(0))]).is_none());
        assert!(best_and_worst(&[]).is_none());
    }

    #[test]
    fn stats_group_per_household() {
        let h1 = Uuid::new_v4();
        let h2 = Uuid::new_v4();
        let obligations = vec![
            obligation(h1, dec!(60), dec!(60)),
            obligation(h1, dec!(40), dec!(30)),
            obligation(h2, dec!(100), dec!(20)),
        ];
        let stats = household_payment_stats(&obligations, &HashMap::new(), &HashMap::new());
        assert_eq!(stats.len(), 2);

        let first = stats.iter().find(|s| s.household_id == h1).unwrap();
        assert_eq!(first.total_receivable, dec!(100));
        assert_eq!(first.total_paid, dec!(90));
        assert_eq!(first.payment_rate, 90.0);
    }

    #[rstest]
    #[case("2025-12", "12/2025")]
    #[case("2025-3", "03/2025")]
    #[case("12/2025", "12/2025")]
    #[case("T12/2025", "12/2025")]
    #[case("T3/2025", "03/2025")]
    fn period_selectors(#[case] selector: &str, #[case] expected_name: &str) {
        let names = period_name_candidates(selector).unwrap();
        assert!(names.iter().any(|n| n == expected_name), "{:?}", names);
    }

    #[rstest]
    #[case("2025")]
    #[case("2025-13")]
    #[case("abcd-ef")]
    #[case("hello/world")]
    #[case("13/2025")]
    #[case("T00/2025")]
    #[case("12/2025/extra")]
    fn bad_period_selectors(#[case] selector: &str) {
        assert!(matches!(
            period_name_candidates(selector),
            Err(ServiceError::ValidationError(_))
        ));
    }
}
