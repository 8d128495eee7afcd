use crate::{
    services::reports::{DashboardAnalytics, HouseholdPaymentStats, ReportSummary, SummaryScope},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    /// Month selector, `YYYY-MM` (also accepts `MM/YYYY` and `TMM/YYYY`)
    pub period_ym: Option<String>,
    /// Exact period; takes precedence over `periodYm`
    #[serde(alias = "period_id")]
    pub period_id: Option<Uuid>,
}

impl SummaryQuery {
    fn scope(self) -> SummaryScope {
        match (self.period_id, self.period_ym) {
            (Some(id), _) => SummaryScope::Period(id),
            (None, Some(ym)) if !ym.trim().is_empty() => SummaryScope::YearMonth(ym),
            _ => SummaryScope::All,
        }
    }
}

/// Registry and collection totals, optionally for one period
#[utoipa::path(
    get,
    path = "/api/v1/reports/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Summary", body = ApiResponse<ReportSummary>),
        (status = 400, description = "Malformed month selector", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown period", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<ReportSummary> {
    let summary = state.services.reports.summary(query.scope()).await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// Last five periods plus best and worst payers of the previous period
#[utoipa::path(
    get,
    path = "/api/v1/reports/analytics",
    responses(
        (status = 200, description = "Analytics", body = ApiResponse<DashboardAnalytics>)
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn analytics(State(state): State<AppState>) -> ApiResult<DashboardAnalytics> {
    let analytics = state.services.reports.analytics().await?;
    Ok(Json(ApiResponse::success(analytics)))
}

/// Per-household receivable and collected amounts for one period
#[utoipa::path(
    get,
    path = "/api/v1/reports/periods/{period_id}/households",
    params(("period_id" = Uuid, Path, description = "Fee period ID")),
    responses(
        (status = 200, description = "Household stats", body = ApiResponse<Vec<HouseholdPaymentStats>>)
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn household_stats(
    State(state): State<AppState>,
    Path(period_id): Path<Uuid>,
) -> ApiResult<Vec<HouseholdPaymentStats>> {
    let stats = state
        .services
        .reports
        .household_stats_for_period(period_id)
        .await?;
    Ok(Json(ApiResponse::success(stats)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_id_wins_over_month() {
        let id = Uuid::new_v4();
        let query = SummaryQuery {
            period_ym: Some("2025-12".to_string()),
            period_id: Some(id),
        };
        assert_eq!(query.scope(), SummaryScope::Period(id));
    }

    #[test]
    fn blank_month_means_everything() {
        let query = SummaryQuery {
            period_ym: Some("  ".to_string()),
            period_id: None,
        };
        assert_eq!(query.scope(), SummaryScope::All);
        assert_eq!(SummaryQuery::default().scope(), SummaryScope::All);
    }
}
