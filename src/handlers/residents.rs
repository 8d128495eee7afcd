use crate::{
    entities::resident::{self, ResidentStatus},
    errors::ServiceError,
    handlers::common::{paginated, parse_optional_enum, ListQuery},
    services::residents::{CreateResidentRequest, UpdateResidentRequest},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct IsHeadResponse {
    pub resident_id: Uuid,
    pub is_head: bool,
}

/// List residents
#[utoipa::path(
    get,
    path = "/api/v1/residents",
    params(ListQuery),
    responses(
        (status = 200, description = "Residents", body = ApiResponse<PaginatedResponse<resident::Model>>),
        (status = 400, description = "Invalid status filter", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "residents"
)]
pub async fn list_residents(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<resident::Model>> {
    let (page, limit) = query.page_and_limit();
    let status = parse_optional_enum::<ResidentStatus>(query.status.as_deref(), "status")?;
    let (items, total) = state
        .services
        .residents
        .list_residents(None, status, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

/// Residents of one household
#[utoipa::path(
    get,
    path = "/api/v1/residents/household/{household_id}",
    params(
        ("household_id" = Uuid, Path, description = "Household ID"),
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)")
    ),
    responses(
        (status = 200, description = "Residents", body = ApiResponse<PaginatedResponse<resident::Model>>)
    ),
    security(("bearer_auth" = [])),
    tag = "residents"
)]
pub async fn list_residents_by_household(
    State(state): State<AppState>,
    Path(household_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<resident::Model>> {
    let (page, limit) = query.page_and_limit();
    let status = parse_optional_enum::<ResidentStatus>(query.status.as_deref(), "status")?;
    let (items, total) = state
        .services
        .residents
        .list_residents(Some(household_id), status, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

/// Get a resident
#[utoipa::path(
    get,
    path = "/api/v1/residents/{id}",
    params(("id" = Uuid, Path, description = "Resident ID")),
    responses(
        (status = 200, description = "Resident", body = ApiResponse<resident::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "residents"
)]
pub async fn get_resident(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<resident::Model> {
    match state.services.residents.get_resident(&id).await? {
        Some(resident) => Ok(Json(ApiResponse::success(resident))),
        None => Err(ServiceError::not_found("Resident", id)),
    }
}

/// Whether a resident heads their household
#[utoipa::path(
    get,
    path = "/api/v1/residents/{id}/is-head",
    params(("id" = Uuid, Path, description = "Resident ID")),
    responses(
        (status = 200, description = "Head flag", body = ApiResponse<IsHeadResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "residents"
)]
pub async fn is_head(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<IsHeadResponse> {
    let is_head = state.services.residents.is_head(id).await?;
    Ok(Json(ApiResponse::success(IsHeadResponse {
        resident_id: id,
        is_head,
    })))
}

/// Register a resident
#[utoipa::path(
    post,
    path = "/api/v1/residents",
    request_body = CreateResidentRequest,
    responses(
        (status = 201, description = "Resident registered", body = ApiResponse<resident::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Household not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Identity card already registered", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "residents"
)]
pub async fn create_resident(
    State(state): State<AppState>,
    Json(payload): Json<CreateResidentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<resident::Model>>), ServiceError> {
    let created = state.services.residents.create_resident(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// Update a resident
#[utoipa::path(
    put,
    path = "/api/v1/residents/{id}",
    params(("id" = Uuid, Path, description = "Resident ID")),
    request_body = UpdateResidentRequest,
    responses(
        (status = 200, description = "Resident updated", body = ApiResponse<resident::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Head cannot be demoted directly", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "residents"
)]
pub async fn update_resident(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateResidentRequest>,
) -> ApiResult<resident::Model> {
    let updated = state.services.residents.update_resident(id, payload).await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// Delete a resident who is not head of household
#[utoipa::path(
    delete,
    path = "/api/v1/residents/{id}",
    params(("id" = Uuid, Path, description = "Resident ID")),
    responses(
        (status = 204, description = "Resident deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Resident is head of household", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "residents"
)]
pub async fn delete_resident(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.residents.delete_resident(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Hand the head role to another member and remove the outgoing head
#[utoipa::path(
    delete,
    path = "/api/v1/residents/{id}/transfer-head/{new_head_id}",
    params(
        ("id" = Uuid, Path, description = "Current head"),
        ("new_head_id" = Uuid, Path, description = "Member of the same household")
    ),
    responses(
        (status = 200, description = "New head", body = ApiResponse<resident::Model>),
        (status = 400, description = "Different households", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Resident is not head of household", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "residents"
)]
pub async fn transfer_head(
    State(state): State<AppState>,
    Path((id, new_head_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<resident::Model> {
    let new_head = state
        .services
        .residents
        .transfer_head(id, new_head_id)
        .await?;
    Ok(Json(ApiResponse::success(new_head)))
}
