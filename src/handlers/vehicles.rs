use crate::{
    entities::vehicle::{self, VehicleType},
    errors::ServiceError,
    handlers::common::{page_and_limit, paginated, parse_optional_enum},
    services::vehicles::{CreateVehicleRequest, UpdateVehicleRequest},
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
pub struct VehicleListQuery {
    /// Page number (1-indexed)
    pub page: Option<u64>,
    /// Page size (max 100)
    pub limit: Option<u64>,
    /// CAR, MOTORBIKE, ELECTRIC_BIKE or BICYCLE
    pub vehicle_type: Option<String>,
}

/// List vehicles
#[utoipa::path(
    get,
    path = "/api/v1/vehicles",
    params(VehicleListQuery),
    responses(
        (status = 200, description = "Vehicles", body = ApiResponse<PaginatedResponse<vehicle::Model>>),
        (status = 400, description = "Unknown vehicle type", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "vehicles"
)]
pub async fn list_vehicles(
    State(state): State<AppState>,
    Query(query): Query<VehicleListQuery>,
) -> ApiResult<PaginatedResponse<vehicle::Model>> {
    let (page, limit) = page_and_limit(query.page, query.limit);
    let vehicle_type =
        parse_optional_enum::<VehicleType>(query.vehicle_type.as_deref(), "vehicle_type")?;
    let (items, total) = state
        .services
        .vehicles
        .list_vehicles(None, vehicle_type, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

/// Vehicles of one household
#[utoipa::path(
    get,
    path = "/api/v1/vehicles/household/{household_id}",
    params(("household_id" = Uuid, Path, description = "Household ID"), VehicleListQuery),
    responses(
        (status = 200, description = "Vehicles", body = ApiResponse<PaginatedResponse<vehicle::Model>>)
    ),
    security(("bearer_auth" = [])),
    tag = "vehicles"
)]
pub async fn list_vehicles_by_household(
    State(state): State<AppState>,
    Path(household_id): Path<Uuid>,
    Query(query): Query<VehicleListQuery>,
) -> ApiResult<PaginatedResponse<vehicle::Model>> {
    let (page, limit) = page_and_limit(query.page, query.limit);
    let vehicle_type =
        parse_optional_enum::<VehicleType>(query.vehicle_type.as_deref(), "vehicle_type")?;
    let (items, total) = state
        .services
        .vehicles
        .list_vehicles(Some(household_id), vehicle_type, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

/// Get a vehicle
#[utoipa::path(
    get,
    path = "/api/v1/vehicles/{id}",
    params(("id" = Uuid, Path, description = "Vehicle ID")),
    responses(
        (status = 200, description = "Vehicle", body = ApiResponse<vehicle::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "vehicles"
)]
pub async fn get_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<vehicle::Model> {
    match state.services.vehicles.get_vehicle(&id).await? {
        Some(vehicle) => Ok(Json(ApiResponse::success(vehicle))),
        None => Err(ServiceError::not_found("Vehicle", id)),
    }
}

/// Register a vehicle
#[utoipa::path(
    post,
    path = "/api/v1/vehicles",
    request_body = CreateVehicleRequest,
    responses(
        (status = 201, description = "Vehicle registered", body = ApiResponse<vehicle::Model>),
        (status = 404, description = "Household not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Plate already registered", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "vehicles"
)]
pub async fn create_vehicle(
    State(state): State<AppState>,
    Json(payload): Json<CreateVehicleRequest>,
) -> Result<(StatusCode, Json<ApiResponse<vehicle::Model>>), ServiceError> {
    let created = state.services.vehicles.create_vehicle(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// Update a vehicle
#[utoipa::path(
    put,
    path = "/api/v1/vehicles/{id}",
    params(("id" = Uuid, Path, description = "Vehicle ID")),
    request_body = UpdateVehicleRequest,
    responses(
        (status = 200, description = "Vehicle updated", body = ApiResponse<vehicle::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Plate already registered", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "vehicles"
)]
pub async fn update_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateVehicleRequest>,
) -> ApiResult<vehicle::Model> {
    let updated = state.services.vehicles.update_vehicle(id, payload).await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// Delete a vehicle
#[utoipa::path(
    delete,
    path = "/api/v1/vehicles/{id}",
    params(("id" = Uuid, Path, description = "Vehicle ID")),
    responses(
        (status = 204, description = "Vehicle deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "vehicles"
)]
pub async fn delete_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.vehicles.delete_vehicle(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
