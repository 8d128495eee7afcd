use crate::{
    db::DbPool,
    entities::notification::{self, NotificationStatus, NotificationType, TargetType},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// BLOCK and HOUSEHOLD audiences need a `target_value`.
fn validate_target(request: &CreateNotificationRequest) -> Result<(), ValidationError> {
    let missing = request
        .target_value
        .as_deref()
        .map_or(true, |v| v.trim().is_empty());
    if request.target_type != TargetType::All && missing {
        return Err(ValidationError::new("target_value is required for this target_type"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_target"))]
#[schema(example = json!({
    "title": "Lịch cắt nước",
    "content": "Tòa A tạm ngưng cấp nước từ 8h đến 11h ngày 20/10.",
    "notification_type": "WARNING",
    "target_type": "BLOCK",
    "target_value": "A"
}))]
pub struct CreateNotificationRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
    pub notification_type: NotificationType,
    pub target_type: TargetType,
    #[validate(length(max = 50))]
    pub target_value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateNotificationRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub content: Option<String>,
    pub notification_type: Option<NotificationType>,
    pub target_type: Option<TargetType>,
    #[validate(length(max = 50))]
    pub target_value: Option<String>,
}

#[derive(Clone)]
pub struct NotificationService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl NotificationService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn list_notifications(
        &self,
        status: Option<NotificationStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<notification::Model>, u64), ServiceError> {
        let mut query = notification::Entity::find();
        if let Some(status) = status {
            query = query.filter(notification::Column::Status.eq(status));
        }
        let paginator = query
            .order_by_desc(notification::Column::CreatedAt)
            .paginate(&*self.db_pool, limit);

        let total = paginator.num_items().await?;
        let notifications = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((notifications, total))
    }

    #[instrument(skip(self))]
    pub async fn get_notification(
        &self,
        id: &Uuid,
    ) -> Result<Option<notification::Model>, ServiceError> {
        Ok(notification::Entity::find_by_id(*id)
            .one(&*self.db_pool)
            .await?)
    }

    /// New notifications start as DRAFT.
    #[instrument(skip(self))]
    pub async fn create_notification(
        &self,
        request: CreateNotificationRequest,
        created_by: Option<String>,
    ) -> Result<notification::Model, ServiceError> {
        request.validate()?;

        let created = notification::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(request.title.trim().to_string()),
            content: Set(request.content),
            notification_type: Set(request.notification_type),
            target_type: Set(request.target_type),
            target_value: Set(request.target_value),
            status: Set(NotificationStatus::Draft),
            created_by: Set(created_by),
            published_at: Set(None),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;

        info!(notification_id = %created.id, "Notification drafted");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn update_notification(
        &self,
        id: Uuid,
        request: UpdateNotificationRequest,
    ) -> Result<notification::Model, ServiceError> {
        request.validate()?;

        let existing = self
            .get_notification(&id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Notification", id))?;

        let mut active: notification::ActiveModel = existing.into();
        if let Some(title) = request.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(content) = request.content {
            active.content = Set(content);
        }
        if let Some(notification_type) = request.notification_type {
            active.notification_type = Set(notification_type);
        }
        if let Some(target_type) = request.target_type {
            active.target_type = Set(target_type);
        }
        if request.target_value.is_some() {
            active.target_value = Set(request.target_value);
        }

        Ok(active.update(&*self.db_pool).await?)
    }

    /// DRAFT → PUBLISHED. A second publish is rejected.
    #[instrument(skip(self))]
    pub async fn publish_notification(
        &self,
        id: Uuid,
    ) -> Result<notification::Model, ServiceError> {
        let now = Utc::now();
        let result = notification::Entity::update_many()
            .col_expr(
                notification::Column::Status,
                Expr::value(NotificationStatus::Published),
            )
            .col_expr(notification::Column::PublishedAt, Expr::value(Some(now)))
            .col_expr(notification::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(notification::Column::Id.eq(id))
            .filter(notification::Column::Status.eq(NotificationStatus::Draft))
            .exec(&*self.db_pool)
            .await?;

        let published = self
            .get_notification(&id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Notification", id))?;

        if result.rows_affected == 0 {
            metrics::record_state_guard_rejection("publish_notification");
            return Err(ServiceError::InvalidTransition(format!(
                "notification {} is already {}",
                id, published.status
            )));
        }

        info!(notification_id = %id, "Notification published");
        self.event_sender
            .send_or_log(Event::NotificationPublished {
                notification_id: id,
                published_at: now,
            })
            .await;
        Ok(published)
    }

    #[instrument(skip(self))]
    pub async fn delete_notification(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = notification::Entity::delete_by_id(id)
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Notification", id));
        }
        Ok(())
    }
}
