use crate::{
    entities::fee_item::{self, FeeItemStatus, FeeType},
    errors::ServiceError,
    handlers::common::{page_and_limit, paginated, parse_enum, parse_optional_enum, ListQuery},
    services::fee_items::{CreateFeeItemRequest, UpdateFeeItemRequest},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct FeeItemListQuery {
    /// Page number (1-indexed)
    pub page: Option<u64>,
    /// Page size (max 100)
    pub limit: Option<u64>,
    /// ACTIVE or INACTIVE
    pub status: Option<String>,
    /// SERVICE or VEHICLE
    pub fee_type: Option<String>,
}

/// List the fee catalog
#[utoipa::path(
    get,
    path = "/api/v1/fee-items",
    params(FeeItemListQuery),
    responses(
        (status = 200, description = "Fee items", body = ApiResponse<PaginatedResponse<fee_item::Model>>),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-items"
)]
pub async fn list_fee_items(
    State(state): State<AppState>,
    Query(query): Query<FeeItemListQuery>,
) -> ApiResult<PaginatedResponse<fee_item::Model>> {
    let (page, limit) = page_and_limit(query.page, query.limit);
    let status = parse_optional_enum::<FeeItemStatus>(query.status.as_deref(), "status")?;
    let fee_type = parse_optional_enum::<FeeType>(query.fee_type.as_deref(), "fee_type")?;
    let (items, total) = state
        .services
        .fee_items
        .list_fee_items(status, fee_type, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

/// Fee items in one status
#[utoipa::path(
    get,
    path = "/api/v1/fee-items/status/{status}",
    params(("status" = String, Path, description = "ACTIVE or INACTIVE"), ListQuery),
    responses(
        (status = 200, description = "Fee items", body = ApiResponse<PaginatedResponse<fee_item::Model>>),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-items"
)]
pub async fn list_fee_items_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<fee_item::Model>> {
    let (page, limit) = query.page_and_limit();
    let status = parse_enum::<FeeItemStatus>(&status, "status")?;
    let (items, total) = state
        .services
        .fee_items
        .list_fee_items(Some(status), None, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

/// Fee items of one type
#[utoipa::path(
    get,
    path = "/api/v1/fee-items/type/{fee_type}",
    params(("fee_type" = String, Path, description = "Fee type"), ListQuery),
    responses(
        (status = 200, description = "Fee items", body = ApiResponse<PaginatedResponse<fee_item::Model>>),
        (status = 400, description = "Unknown fee type", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-items"
)]
pub async fn list_fee_items_by_type(
    State(state): State<AppState>,
    Path(fee_type): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<fee_item::Model>> {
    let (page, limit) = query.page_and_limit();
    let fee_type = parse_enum::<FeeType>(&fee_type, "fee_type")?;
    let (items, total) = state
        .services
        .fee_items
        .list_fee_items(None, Some(fee_type), page, limit)
        .await?;
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

/// Get a fee item
#[utoipa::path(
    get,
    path = "/api/v1/fee-items/{id}",
    params(("id" = Uuid, Path, description = "Fee item ID")),
    responses(
        (status = 200, description = "Fee item", body = ApiResponse<fee_item::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-items"
)]
pub async fn get_fee_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<fee_item::Model> {
    match state.services.fee_items.get_fee_item(&id).await? {
        Some(item) => Ok(Json(ApiResponse::success(item))),
        None => Err(ServiceError::not_found("Fee item", id)),
    }
}

/// Add a fee item to the catalog
#[utoipa::path(
    post,
    path = "/api/v1/fee-items",
    request_body = CreateFeeItemRequest,
    responses(
        (status = 201, description = "Fee item created", body = ApiResponse<fee_item::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already used", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-items"
)]
pub async fn create_fee_item(
    State(state): State<AppState>,
    Json(payload): Json<CreateFeeItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<fee_item::Model>>), ServiceError> {
    let created = state.services.fee_items.create_fee_item(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// Update a fee item. Existing obligations keep the amounts they were billed with.
#[utoipa::path(
    put,
    path = "/api/v1/fee-items/{id}",
    params(("id" = Uuid, Path, description = "Fee item ID")),
    request_body = UpdateFeeItemRequest,
    responses(
        (status = 200, description = "Fee item updated", body = ApiResponse<fee_item::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-items"
)]
pub async fn update_fee_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateFeeItemRequest>,
) -> ApiResult<fee_item::Model> {
    let updated = state.services.fee_items.update_fee_item(id, payload).await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// Delete a fee item that was never billed
#[utoipa::path(
    delete,
    path = "/api/v1/fee-items/{id}",
    params(("id" = Uuid, Path, description = "Fee item ID")),
    responses(
        (status = 204, description = "Fee item deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Fee item has obligations", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "fee-items"
)]
pub async fn delete_fee_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.fee_items.delete_fee_item(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
