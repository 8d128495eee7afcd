use crate::{services::dashboard::DashboardStats, ApiResponse, ApiResult, AppState};
use axum::{extract::State, response::Json};

/// Headline counters for the console landing page
#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    responses(
        (status = 200, description = "Dashboard counters", body = ApiResponse<DashboardStats>)
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn dashboard(State(state): State<AppState>) -> ApiResult<DashboardStats> {
    let stats = state.services.dashboard.stats().await?;
    Ok(Json(ApiResponse::success(stats)))
}
