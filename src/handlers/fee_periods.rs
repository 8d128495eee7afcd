use crate::{
    commands::fee_periods::generate_obligations_command::GenerateObligationsResult,
    entities::fee_period::{self, FeePeriodStatus},
    errors::ServiceError,
    handlers::common::{paginated, parse_optional_enum, ListQuery},
    services::fee_periods::{CreateFeePeriodRequest, UpdateFeePeriodRequest},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

/// List fee periods, newest first
#[utoipa::path(
    get,
    path = "/api/v1/fee-periods",
    params(ListQuery),
    responses(
        (status = 200, description = "Fee periods", body = ApiResponse<PaginatedResponse<fee_period::Model>>),
        (status = 400, description = "Invalid status filter", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-periods"
)]
pub async fn list_fee_periods(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<fee_period::Model>> {
    let (page, limit) = query.page_and_limit();
    let status = parse_optional_enum::<FeePeriodStatus>(query.status.as_deref(), "status")?;
    let (items, total) = state
        .services
        .fee_periods
        .list_fee_periods(status, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

/// The period currently being worked: latest OPEN, else DRAFT, else CLOSED
#[utoipa::path(
    get,
    path = "/api/v1/fee-periods/current",
    responses(
        (status = 200, description = "Current period", body = ApiResponse<fee_period::Model>),
        (status = 404, description = "No periods yet", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-periods"
)]
pub async fn current_fee_period(State(state): State<AppState>) -> ApiResult<fee_period::Model> {
    match state.services.fee_periods.current_fee_period().await? {
        Some(period) => Ok(Json(ApiResponse::success(period))),
        None => Err(ServiceError::NotFound("No fee period exists".to_string())),
    }
}

/// Get a fee period
#[utoipa::path(
    get,
    path = "/api/v1/fee-periods/{id}",
    params(("id" = Uuid, Path, description = "Fee period ID")),
    responses(
        (status = 200, description = "Fee period", body = ApiResponse<fee_period::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-periods"
)]
pub async fn get_fee_period(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<fee_period::Model> {
    match state.services.fee_periods.get_fee_period(&id).await? {
        Some(period) => Ok(Json(ApiResponse::success(period))),
        None => Err(ServiceError::not_found("Fee period", id)),
    }
}

/// Create a DRAFT fee period
#[utoipa::path(
    post,
    path = "/api/v1/fee-periods",
    request_body = CreateFeePeriodRequest,
    responses(
        (status = 201, description = "Fee period created", body = ApiResponse<fee_period::Model>),
        (status = 400, description = "Blank name or start after end", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-periods"
)]
pub async fn create_fee_period(
    State(state): State<AppState>,
    Json(payload): Json<CreateFeePeriodRequest>,
) -> Result<(StatusCode, Json<ApiResponse<fee_period::Model>>), ServiceError> {
    let created = state.services.fee_periods.create_fee_period(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// Edit a DRAFT fee period
#[utoipa::path(
    put,
    path = "/api/v1/fee-periods/{id}",
    params(("id" = Uuid, Path, description = "Fee period ID")),
    request_body = UpdateFeePeriodRequest,
    responses(
        (status = 200, description = "Fee period updated", body = ApiResponse<fee_period::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Period is no longer DRAFT", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-periods"
)]
pub async fn update_fee_period(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateFeePeriodRequest>,
) -> ApiResult<fee_period::Model> {
    let updated = state
        .services
        .fee_periods
        .update_fee_period(id, payload)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// Delete a DRAFT fee period
#[utoipa::path(
    delete,
    path = "/api/v1/fee-periods/{id}",
    params(("id" = Uuid, Path, description = "Fee period ID")),
    responses(
        (status = 204, description = "Fee period deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Period is no longer DRAFT", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-periods"
)]
pub async fn delete_fee_period(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.fee_periods.delete_fee_period(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Open a DRAFT period and bill every active household
#[utoipa::path(
    post,
    path = "/api/v1/fee-periods/{id}/generate",
    params(("id" = Uuid, Path, description = "Fee period ID")),
    responses(
        (status = 200, description = "Obligations generated", body = ApiResponse<GenerateObligationsResult>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Period is not DRAFT", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-periods"
)]
pub async fn generate_obligations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<GenerateObligationsResult> {
    let result = state.services.fee_periods.generate_obligations(id).await?;
    Ok(Json(ApiResponse::success(result)))
}

/// Close an OPEN period
#[utoipa::path(
    patch,
    path = "/api/v1/fee-periods/{id}/close",
    params(("id" = Uuid, Path, description = "Fee period ID")),
    responses(
        (status = 200, description = "Fee period closed", body = ApiResponse<fee_period::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Period is not OPEN", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-periods"
)]
pub async fn close_fee_period(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<fee_period::Model> {
    let closed = state.services.fee_periods.close_fee_period(id).await?;
    Ok(Json(ApiResponse::success(closed)))
}
