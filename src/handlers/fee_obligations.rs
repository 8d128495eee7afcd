use crate::{
    auth::AuthUser,
    commands::{
        fee_obligations::{PayFeeObligationCommand, PayFeeObligationResult},
        fee_periods::generate_obligations_command::GenerateObligationsResult,
    },
    entities::{
        fee_obligation::{ObligationStatus, PaymentMethod},
        fee_payment,
    },
    errors::ServiceError,
    handlers::common::{page_and_limit, paginated, parse_enum, parse_optional_enum},
    services::fee_obligations::{
        CreateFeeObligationRequest, FeeObligationView, ObligationFilter, UpdateFeeObligationRequest,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ObligationListQuery {
    /// Page number (1-indexed)
    pub page: Option<u64>,
    /// Page size (max 100)
    pub limit: Option<u64>,
    pub household_id: Option<Uuid>,
    pub period_id: Option<Uuid>,
    /// UNPAID or PAID
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    /// Page number (1-indexed)
    pub page: Option<u64>,
    /// Page size (max 100)
    pub limit: Option<u64>,
}

/// Body of `PATCH /fee-obligations/{id}/pay`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "paid_amount": "525000",
    "payment_method": "CASH",
    "payer_name": "Nguyễn Văn An",
    "expected_version": 0
}))]
pub struct PayObligationRequest {
    pub paid_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payer_name: Option<String>,
    pub note: Option<String>,
    /// Version last seen by the caller
    pub expected_version: Option<i32>,
}

async fn list_with(
    state: &AppState,
    filter: ObligationFilter,
    page: Option<u64>,
    limit: Option<u64>,
) -> ApiResult<PaginatedResponse<FeeObligationView>> {
    let (page, limit) = page_and_limit(page, limit);
    let (items, total) = state
        .services
        .fee_obligations
        .list_fee_obligations(filter, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

/// List obligations
#[utoipa::path(
    get,
    path = "/api/v1/fee-obligations",
    params(ObligationListQuery),
    responses(
        (status = 200, description = "Obligations", body = ApiResponse<PaginatedResponse<FeeObligationView>>),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-obligations"
)]
pub async fn list_fee_obligations(
    State(state): State<AppState>,
    Query(query): Query<ObligationListQuery>,
) -> ApiResult<PaginatedResponse<FeeObligationView>> {
    let filter = ObligationFilter {
        household_id: query.household_id,
        period_id: query.period_id,
        status: parse_optional_enum::<ObligationStatus>(query.status.as_deref(), "status")?,
    };
    list_with(&state, filter, query.page, query.limit).await
}

/// Obligations of one household. Residents may read their own household only.
#[utoipa::path(
    get,
    path = "/api/v1/fee-obligations/household/{household_id}",
    params(("household_id" = Uuid, Path, description = "Household ID"), PageQuery),
    responses(
        (status = 200, description = "Obligations", body = ApiResponse<PaginatedResponse<FeeObligationView>>),
        (status = 403, description = "Another household", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-obligations"
)]
pub async fn list_household_obligations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(household_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> ApiResult<PaginatedResponse<FeeObligationView>> {
    if !user.can_read_household_obligations(household_id) {
        warn!(user_id = %user.user_id, %household_id, "Obligation read outside own household");
        return Err(ServiceError::Forbidden(
            "Not allowed to read this household's obligations".to_string(),
        ));
    }
    let filter = ObligationFilter {
        household_id: Some(household_id),
        ..Default::default()
    };
    list_with(&state, filter, query.page, query.limit).await
}

/// Obligations of one period
#[utoipa::path(
    get,
    path = "/api/v1/fee-obligations/period/{period_id}",
    params(("period_id" = Uuid, Path, description = "Fee period ID"), PageQuery),
    responses(
        (status = 200, description = "Obligations", body = ApiResponse<PaginatedResponse<FeeObligationView>>)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-obligations"
)]
pub async fn list_period_obligations(
    State(state): State<AppState>,
    Path(period_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> ApiResult<PaginatedResponse<FeeObligationView>> {
    let filter = ObligationFilter {
        period_id: Some(period_id),
        ..Default::default()
    };
    list_with(&state, filter, query.page, query.limit).await
}

/// Obligations in one payment status
#[utoipa::path(
    get,
    path = "/api/v1/fee-obligations/status/{status}",
    params(("status" = String, Path, description = "UNPAID or PAID"), PageQuery),
    responses(
        (status = 200, description = "Obligations", body = ApiResponse<PaginatedResponse<FeeObligationView>>),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-obligations"
)]
pub async fn list_obligations_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<PaginatedResponse<FeeObligationView>> {
    let filter = ObligationFilter {
        status: Some(parse_enum::<ObligationStatus>(&status, "status")?),
        ..Default::default()
    };
    list_with(&state, filter, query.page, query.limit).await
}

/// Get an obligation
#[utoipa::path(
    get,
    path = "/api/v1/fee-obligations/{id}",
    params(("id" = Uuid, Path, description = "Obligation ID")),
    responses(
        (status = 200, description = "Obligation", body = ApiResponse<FeeObligationView>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-obligations"
)]
pub async fn get_fee_obligation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<FeeObligationView> {
    match state.services.fee_obligations.get_fee_obligation(&id).await? {
        Some(view) => Ok(Json(ApiResponse::success(view))),
        None => Err(ServiceError::not_found("Fee obligation", id)),
    }
}

/// Add a single obligation to a DRAFT or OPEN period
#[utoipa::path(
    post,
    path = "/api/v1/fee-obligations",
    request_body = CreateFeeObligationRequest,
    responses(
        (status = 201, description = "Obligation created", body = ApiResponse<FeeObligationView>),
        (status = 404, description = "Household, item or period not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Duplicate or period CLOSED", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-obligations"
)]
pub async fn create_fee_obligation(
    State(state): State<AppState>,
    Json(payload): Json<CreateFeeObligationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FeeObligationView>>), ServiceError> {
    let created = state
        .services
        .fee_obligations
        .create_fee_obligation(payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// Correct the amount, due date or note of an obligation
#[utoipa::path(
    put,
    path = "/api/v1/fee-obligations/{id}",
    params(("id" = Uuid, Path, description = "Obligation ID")),
    request_body = UpdateFeeObligationRequest,
    responses(
        (status = 200, description = "Obligation updated", body = ApiResponse<FeeObligationView>),
        (status = 400, description = "Negative amount", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Period CLOSED or stale version", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-obligations"
)]
pub async fn update_fee_obligation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateFeeObligationRequest>,
) -> ApiResult<FeeObligationView> {
    let updated = state
        .services
        .fee_obligations
        .update_fee_obligation(id, payload)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// Delete an unpaid obligation of a period that is not CLOSED
#[utoipa::path(
    delete,
    path = "/api/v1/fee-obligations/{id}",
    params(("id" = Uuid, Path, description = "Obligation ID")),
    responses(
        (status = 204, description = "Obligation deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Period CLOSED or payments recorded", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-obligations"
)]
pub async fn delete_fee_obligation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.fee_obligations.delete_fee_obligation(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Record a payment against an obligation
#[utoipa::path(
    patch,
    path = "/api/v1/fee-obligations/{id}/pay",
    params(("id" = Uuid, Path, description = "Obligation ID")),
    request_body = PayObligationRequest,
    responses(
        (status = 200, description = "Payment recorded", body = ApiResponse<PayFeeObligationResult>),
        (status = 400, description = "Amount must be positive", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already PAID, period not OPEN, or stale version", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-obligations"
)]
pub async fn pay_fee_obligation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PayObligationRequest>,
) -> ApiResult<PayFeeObligationResult> {
    let command = PayFeeObligationCommand {
        obligation_id: id,
        paid_amount: payload.paid_amount,
        payment_method: payload.payment_method,
        payer_name: payload.payer_name,
        note: payload.note,
        expected_version: payload.expected_version,
        recorded_by: Some(user.username),
    };
    let result = state
        .services
        .fee_obligations
        .pay_fee_obligation(command)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

/// Payment history of an obligation
#[utoipa::path(
    get,
    path = "/api/v1/fee-obligations/{id}/payments",
    params(("id" = Uuid, Path, description = "Obligation ID")),
    responses(
        (status = 200, description = "Payments, oldest first", body = ApiResponse<Vec<fee_payment::Model>>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-obligations"
)]
pub async fn list_payments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<fee_payment::Model>> {
    let payments = state.services.fee_obligations.list_payments(id).await?;
    Ok(Json(ApiResponse::success(payments)))
}

/// Same as `POST /fee-periods/{id}/generate`
#[utoipa::path(
    post,
    path = "/api/v1/fee-obligations/generate/{period_id}",
    params(("period_id" = Uuid, Path, description = "Fee period ID")),
    responses(
        (status = 200, description = "Obligations generated", body = ApiResponse<GenerateObligationsResult>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Period is not DRAFT", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-obligations"
)]
pub async fn generate_for_period(
    State(state): State<AppState>,
    Path(period_id): Path<Uuid>,
) -> ApiResult<GenerateObligationsResult> {
    let result = state
        .services
        .fee_periods
        .generate_obligations(period_id)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}
