use crate::{
    entities::{
        household::{self, HouseholdStatus},
        resident, vehicle,
    },
    errors::ServiceError,
    handlers::common::{paginated, parse_enum, parse_optional_enum, ListQuery},
    services::{
        households::{CreateHouseholdRequest, HouseholdDetails, UpdateHouseholdRequest},
        residents::CreateResidentRequest,
        vehicles::CreateVehicleRequest,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

/// List households
#[utoipa::path(
    get,
    path = "/api/v1/households",
    params(ListQuery),
    responses(
        (status = 200, description = "Households", body = ApiResponse<PaginatedResponse<household::Model>>),
        (status = 400, description = "Invalid status filter", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "households"
)]
pub async fn list_households(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<household::Model>> {
    let (page, limit) = query.page_and_limit();
    let status = parse_optional_enum::<HouseholdStatus>(query.status.as_deref(), "status")?;
    let (items, total) = state
        .services
        .households
        .list_households(status, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

/// List households in one status
#[utoipa::path(
    get,
    path = "/api/v1/households/status/{status}",
    params(
        ("status" = String, Path, description = "ACTIVE, TEMPORARY or MOVED_OUT"),
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)")
    ),
    responses(
        (status = 200, description = "Households", body = ApiResponse<PaginatedResponse<household::Model>>),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "households"
)]
pub async fn list_households_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<household::Model>> {
    let (page, limit) = query.page_and_limit();
    let status = parse_enum::<HouseholdStatus>(&status, "status")?;
    let (items, total) = state
        .services
        .households
        .list_households(Some(status), page, limit)
        .await?;
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

/// Get a household
#[utoipa::path(
    get,
    path = "/api/v1/households/{id}",
    params(("id" = Uuid, Path, description = "Household ID")),
    responses(
        (status = 200, description = "Household", body = ApiResponse<household::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "households"
)]
pub async fn get_household(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<household::Model> {
    match state.services.households.get_household(&id).await? {
        Some(household) => Ok(Json(ApiResponse::success(household))),
        None => Err(ServiceError::not_found("Household", id)),
    }
}

/// Look a household up by its code
#[utoipa::path(
    get,
    path = "/api/v1/households/code/{code}",
    params(("code" = String, Path, description = "Household code, e.g. HK001")),
    responses(
        (status = 200, description = "Household", body = ApiResponse<household::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "households"
)]
pub async fn get_household_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<household::Model> {
    match state.services.households.get_household_by_code(&code).await? {
        Some(household) => Ok(Json(ApiResponse::success(household))),
        None => Err(ServiceError::NotFound(format!("Household {} not found", code))),
    }
}

/// Household with apartment, residents and vehicles
#[utoipa::path(
    get,
    path = "/api/v1/households/{id}/details",
    params(("id" = Uuid, Path, description = "Household ID")),
    responses(
        (status = 200, description = "Household details", body = ApiResponse<HouseholdDetails>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "households"
)]
pub async fn get_household_details(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<HouseholdDetails> {
    let details = state.services.households.get_household_details(id).await?;
    Ok(Json(ApiResponse::success(details)))
}

/// Register a household
#[utoipa::path(
    post,
    path = "/api/v1/households",
    request_body = CreateHouseholdRequest,
    responses(
        (status = 201, description = "Household registered", body = ApiResponse<household::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Household code taken", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "households"
)]
pub async fn create_household(
    State(state): State<AppState>,
    Json(payload): Json<CreateHouseholdRequest>,
) -> Result<(StatusCode, Json<ApiResponse<household::Model>>), ServiceError> {
    let created = state.services.households.create_household(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// Update a household
#[utoipa::path(
    put,
    path = "/api/v1/households/{id}",
    params(("id" = Uuid, Path, description = "Household ID")),
    request_body = UpdateHouseholdRequest,
    responses(
        (status = 200, description = "Household updated", body = ApiResponse<household::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Household has moved out", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "households"
)]
pub async fn update_household(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateHouseholdRequest>,
) -> ApiResult<household::Model> {
    let updated = state
        .services
        .households
        .update_household(id, payload)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// Mark a household as moved out
#[utoipa::path(
    patch,
    path = "/api/v1/households/{id}/move-out",
    params(("id" = Uuid, Path, description = "Household ID")),
    responses(
        (status = 200, description = "Household moved out", body = ApiResponse<household::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already moved out", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "households"
)]
pub async fn move_out_household(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<household::Model> {
    let moved = state.services.households.move_out(id).await?;
    Ok(Json(ApiResponse::success(moved)))
}

/// Delete a household with its residents and vehicles
#[utoipa::path(
    delete,
    path = "/api/v1/households/{id}",
    params(("id" = Uuid, Path, description = "Household ID")),
    responses(
        (status = 204, description = "Household deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "households"
)]
pub async fn delete_household(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.households.delete_household(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Residents of a household
#[utoipa::path(
    get,
    path = "/api/v1/households/{id}/residents",
    params(
        ("id" = Uuid, Path, description = "Household ID"),
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)")
    ),
    responses(
        (status = 200, description = "Residents", body = ApiResponse<PaginatedResponse<resident::Model>>),
        (status = 404, description = "Household not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "households"
)]
pub async fn list_household_residents(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<resident::Model>> {
    ensure_household(&state, id).await?;
    let (page, limit) = query.page_and_limit();
    let (items, total) = state
        .services
        .residents
        .list_residents(Some(id), None, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

/// Add a resident to a household
#[utoipa::path(
    post,
    path = "/api/v1/households/{id}/residents",
    params(("id" = Uuid, Path, description = "Household ID")),
    request_body = CreateResidentRequest,
    responses(
        (status = 201, description = "Resident registered", body = ApiResponse<resident::Model>),
        (status = 404, description = "Household not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "households"
)]
pub async fn add_household_resident(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<CreateResidentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<resident::Model>>), ServiceError> {
    payload.household_id = id;
    let created = state.services.residents.create_resident(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// Vehicles of a household
#[utoipa::path(
    get,
    path = "/api/v1/households/{id}/vehicles",
    params(
        ("id" = Uuid, Path, description = "Household ID"),
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)")
    ),
    responses(
        (status = 200, description = "Vehicles", body = ApiResponse<PaginatedResponse<vehicle::Model>>),
        (status = 404, description = "Household not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "households"
)]
pub async fn list_household_vehicles(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<vehicle::Model>> {
    ensure_household(&state, id).await?;
    let (page, limit) = query.page_and_limit();
    let (items, total) = state
        .services
        .vehicles
        .list_vehicles(Some(id), None, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

/// Register a vehicle for a household
#[utoipa::path(
    post,
    path = "/api/v1/households/{id}/vehicles",
    params(("id" = Uuid, Path, description = "Household ID")),
    request_body = CreateVehicleRequest,
    responses(
        (status = 201, description = "Vehicle registered", body = ApiResponse<vehicle::Model>),
        (status = 404, description = "Household not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Plate already registered", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "households"
)]
pub async fn add_household_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<CreateVehicleRequest>,
) -> Result<(StatusCode, Json<ApiResponse<vehicle::Model>>), ServiceError> {
    payload.household_id = id;
    let created = state.services.vehicles.create_vehicle(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

async fn ensure_household(state: &AppState, id: Uuid) -> Result<(), ServiceError> {
    match state.services.households.get_household(&id).await? {
        Some(_) => Ok(()),
        None => Err(ServiceError::not_found("Household", id)),
    }
}
