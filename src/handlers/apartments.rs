use crate::{
    entities::apartment::{self, ApartmentStatus},
    errors::ServiceError,
    handlers::common::{paginated, parse_enum, parse_optional_enum, ListQuery},
    services::apartments::{CreateApartmentRequest, UpdateApartmentRequest},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

/// List apartments
#[utoipa::path(
    get,
    path = "/api/v1/apartments",
    params(ListQuery),
    responses(
        (status = 200, description = "Apartments", body = ApiResponse<PaginatedResponse<apartment::Model>>),
        (status = 400, description = "Invalid status filter", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "apartments"
)]
pub async fn list_apartments(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<apartment::Model>> {
    let (page, limit) = query.page_and_limit();
    let status = parse_optional_enum::<ApartmentStatus>(query.status.as_deref(), "status")?;
    let (items, total) = state
        .services
        .apartments
        .list_apartments(status, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

/// List apartments in one status
#[utoipa::path(
    get,
    path = "/api/v1/apartments/status/{status}",
    params(
        ("status" = String, Path, description = "EMPTY, OCCUPIED or MAINTENANCE"),
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)")
    ),
    responses(
        (status = 200, description = "Apartments", body = ApiResponse<PaginatedResponse<apartment::Model>>),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "apartments"
)]
pub async fn list_apartments_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<apartment::Model>> {
    let (page, limit) = query.page_and_limit();
    let status = parse_enum::<ApartmentStatus>(&status, "status")?;
    let (items, total) = state
        .services
        .apartments
        .list_apartments(Some(status), page, limit)
        .await?;
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

/// Get an apartment
#[utoipa::path(
    get,
    path = "/api/v1/apartments/{id}",
    params(("id" = Uuid, Path, description = "Apartment ID")),
    responses(
        (status = 200, description = "Apartment", body = ApiResponse<apartment::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "apartments"
)]
pub async fn get_apartment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<apartment::Model> {
    match state.services.apartments.get_apartment(&id).await? {
        Some(apartment) => Ok(Json(ApiResponse::success(apartment))),
        None => Err(ServiceError::not_found("Apartment", id)),
    }
}

/// Create an apartment
#[utoipa::path(
    post,
    path = "/api/v1/apartments",
    request_body = CreateApartmentRequest,
    responses(
        (status = 201, description = "Apartment created", body = ApiResponse<apartment::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Block and unit already registered", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "apartments"
)]
pub async fn create_apartment(
    State(state): State<AppState>,
    Json(payload): Json<CreateApartmentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<apartment::Model>>), ServiceError> {
    let created = state.services.apartments.create_apartment(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// Update an apartment
#[utoipa::path(
    put,
    path = "/api/v1/apartments/{id}",
    params(("id" = Uuid, Path, description = "Apartment ID")),
    request_body = UpdateApartmentRequest,
    responses(
        (status = 200, description = "Apartment updated", body = ApiResponse<apartment::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "apartments"
)]
pub async fn update_apartment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateApartmentRequest>,
) -> ApiResult<apartment::Model> {
    let updated = state
        .services
        .apartments
        .update_apartment(id, payload)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// Delete an apartment
#[utoipa::path(
    delete,
    path = "/api/v1/apartments/{id}",
    params(("id" = Uuid, Path, description = "Apartment ID")),
    responses(
        (status = 204, description = "Apartment deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Apartment is occupied", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "apartments"
)]
pub async fn delete_apartment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.apartments.delete_apartment(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
