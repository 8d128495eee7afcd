use crate::{
    auth::{hash_password, verify_password, PasswordPolicy, UserInfo},
    db::DbPool,
    entities::{
        household,
        user::{self, UserRole, UserStatus},
    },
    errors::ServiceError,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "username": "ketoan01",
    "password": "blue-Harbor-42",
    "full_name": "Đỗ Thu Hà",
    "role": "KE_TOAN"
}))]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub full_name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    pub role: UserRole,
    pub status: Option<UserStatus>,
    pub household_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub full_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub household_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub old_password: String,
    pub new_password: String,
}

/// Staff-managed accounts. Responses use [`UserInfo`] so hashes never leave
/// the service.
#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    async fn find_user(&self, id: Uuid) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", id))
    }

    async fn ensure_household(&self, household_id: Option<Uuid>) -> Result<(), ServiceError> {
        if let Some(id) = household_id {
            if household::Entity::find_by_id(id)
                .one(&*self.db_pool)
                .await?
                .is_none()
            {
                return Err(ServiceError::not_found("Household", id));
            }
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_users(
        &self,
        role: Option<UserRole>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<UserInfo>, u64), ServiceError> {
        let mut query = user::Entity::find();
        if let Some(role) = role {
            query = query.filter(user::Column::Role.eq(role));
        }
        let paginator = query
            .order_by_asc(user::Column::Username)
            .paginate(&*self.db_pool, limit);

        let total = paginator.num_items().await?;
        let users = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((users.into_iter().map(UserInfo::from).collect(), total))
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: &Uuid) -> Result<Option<UserInfo>, ServiceError> {
        Ok(user::Entity::find_by_id(*id)
            .one(&*self.db_pool)
            .await?
            .map(UserInfo::from))
    }

    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<UserInfo, ServiceError> {
        request.validate()?;
        PasswordPolicy::default()
            .validate(&request.password, Some(&request.username))
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        self.ensure_household(request.household_id).await?;

        let password_hash = hash_password(&request.password)
            .map_err(|e| ServiceError::InternalError(format!("password hashing failed: {}", e)))?;

        let created = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(request.username.trim().to_string()),
            password_hash: Set(password_hash),
            full_name: Set(request.full_name.trim().to_string()),
            email: Set(request.email),
            phone: Set(request.phone),
            role: Set(request.role),
            status: Set(request.status.unwrap_or(UserStatus::Active)),
            household_id: Set(request.household_id),
            last_login_at: Set(None),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;

        info!(user_id = %created.id, role = %created.role, "User account created");
        Ok(UserInfo::from(created))
    }

    #[instrument(skip(self))]
    pub async fn update_user(
        &self,
        id: Uuid,
        request: UpdateUserRequest,
    ) -> Result<UserInfo, ServiceError> {
        request.validate()?;
        self.ensure_household(request.household_id).await?;

        let mut active: user::ActiveModel = self.find_user(id).await?.into();
        if let Some(full_name) = request.full_name {
            active.full_name = Set(full_name.trim().to_string());
        }
        if request.email.is_some() {
            active.email = Set(request.email);
        }
        if request.phone.is_some() {
            active.phone = Set(request.phone);
        }
        if let Some(role) = request.role {
            active.role = Set(role);
        }
        if let Some(status) = request.status {
            active.status = Set(status);
        }
        if request.household_id.is_some() {
            active.household_id = Set(request.household_id);
        }

        Ok(UserInfo::from(active.update(&*self.db_pool).await?))
    }

    /// The old password must verify before the new one is stored.
    #[instrument(skip(self, request))]
    pub async fn change_password(
        &self,
        id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<(), ServiceError> {
        request.validate()?;
        let account = self.find_user(id).await?;

        if !verify_password(&request.old_password, &account.password_hash) {
            warn!(user_id = %id, "Password change with wrong current password");
            return Err(ServiceError::ValidationError(
                "current password is incorrect".to_string(),
            ));
        }
        PasswordPolicy::default()
            .validate(&request.new_password, Some(&account.username))
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let password_hash = hash_password(&request.new_password)
            .map_err(|e| ServiceError::InternalError(format!("password hashing failed: {}", e)))?;
        let mut active: user::ActiveModel = account.into();
        active.password_hash = Set(password_hash);
        active.update(&*self.db_pool).await?;

        info!(user_id = %id, "Password changed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = user::Entity::delete_by_id(id)
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("User", id));
        }
        Ok(())
    }
}
