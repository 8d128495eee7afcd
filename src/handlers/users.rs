use crate::{
    auth::UserInfo,
    entities::user::UserRole,
    errors::ServiceError,
    handlers::common::{page_and_limit, paginated, parse_optional_enum},
    services::users::{ChangePasswordRequest, CreateUserRequest, UpdateUserRequest},
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
pub struct UserListQuery {
    /// Page number (1-indexed)
    pub page: Option<u64>,
    /// Page size (max 100)
    pub limit: Option<u64>,
    /// ADMIN, TO_TRUONG, KE_TOAN or RESIDENT
    pub role: Option<String>,
}

/// List accounts
#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Accounts", body = ApiResponse<PaginatedResponse<UserInfo>>),
        (status = 400, description = "Unknown role", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> ApiResult<PaginatedResponse<UserInfo>> {
    let (page, limit) = page_and_limit(query.page, query.limit);
    let role = parse_optional_enum::<UserRole>(query.role.as_deref(), "role")?;
    let (items, total) = state.services.users.list_users(role, page, limit).await?;
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

/// Get an account
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Account", body = ApiResponse<UserInfo>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_user(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<UserInfo> {
    match state.services.users.get_user(&id).await? {
        Some(user) => Ok(Json(ApiResponse::success(user))),
        None => Err(ServiceError::not_found("User", id)),
    }
}

/// Create a staff or resident account
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<UserInfo>),
        (status = 400, description = "Invalid request or weak password", body = crate::errors::ErrorResponse),
        (status = 409, description = "Username taken", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserInfo>>), ServiceError> {
    let created = state.services.users.create_user(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// Update an account
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Account updated", body = ApiResponse<UserInfo>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<UserInfo> {
    let updated = state.services.users.update_user(id, payload).await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// Change a password; the current one must verify
#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}/password",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Wrong current password or weak new one", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn change_password(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ServiceError> {
    state.services.users.change_password(id, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete an account
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.users.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
