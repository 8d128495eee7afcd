use crate::{
    auth::AuthUser,
    entities::notification::{self, NotificationStatus},
    errors::ServiceError,
    handlers::common::{paginated, parse_enum, parse_optional_enum, ListQuery},
    services::notifications::{CreateNotificationRequest, UpdateNotificationRequest},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use uuid::Uuid;

/// List notifications, newest first
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    params(ListQuery),
    responses(
        (status = 200, description = "Notifications", body = ApiResponse<PaginatedResponse<notification::Model>>)
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<notification::Model>> {
    let (page, limit) = query.page_and_limit();
    let status = parse_optional_enum::<NotificationStatus>(query.status.as_deref(), "status")?;
    let (items, total) = state
        .services
        .notifications
        .list_notifications(status, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

/// Notifications in one status
#[utoipa::path(
    get,
    path = "/api/v1/notifications/status/{status}",
    params(("status" = String, Path, description = "DRAFT or PUBLISHED"), ListQuery),
    responses(
        (status = 200, description = "Notifications", body = ApiResponse<PaginatedResponse<notification::Model>>),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
pub async fn list_notifications_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<notification::Model>> {
    let (page, limit) = query.page_and_limit();
    let status = parse_enum::<NotificationStatus>(&status, "status")?;
    let (items, total) = state
        .services
        .notifications
        .list_notifications(Some(status), page, limit)
        .await?;
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

/// Get a notification
#[utoipa::path(
    get,
    path = "/api/v1/notifications/{id}",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification", body = ApiResponse<notification::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
pub async fn get_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<notification::Model> {
    match state.services.notifications.get_notification(&id).await? {
        Some(notification) => Ok(Json(ApiResponse::success(notification))),
        None => Err(ServiceError::not_found("Notification", id)),
    }
}

/// Draft a notification
#[utoipa::path(
    post,
    path = "/api/v1/notifications",
    request_body = CreateNotificationRequest,
    responses(
        (status = 201, description = "Notification drafted", body = ApiResponse<notification::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
pub async fn create_notification(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<notification::Model>>), ServiceError> {
    let created = state
        .services
        .notifications
        .create_notification(payload, Some(user.username))
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// Edit a notification
#[utoipa::path(
    put,
    path = "/api/v1/notifications/{id}",
    params(("id" = Uuid, Path, description = "Notification ID")),
    request_body = UpdateNotificationRequest,
    responses(
        (status = 200, description = "Notification updated", body = ApiResponse<notification::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
pub async fn update_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateNotificationRequest>,
) -> ApiResult<notification::Model> {
    let updated = state
        .services
        .notifications
        .update_notification(id, payload)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// Publish a DRAFT notification
#[utoipa::path(
    patch,
    path = "/api/v1/notifications/{id}/publish",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification published", body = ApiResponse<notification::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already published", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
pub async fn publish_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<notification::Model> {
    let published = state
        .services
        .notifications
        .publish_notification(id)
        .await?;
    Ok(Json(ApiResponse::success(published)))
}

/// Delete a notification
#[utoipa::path(
    delete,
    path = "/api/v1/notifications/{id}",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 204, description = "Notification deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.notifications.delete_notification(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
