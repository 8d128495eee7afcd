/*!
 * # Authentication and Authorization Module
 *
 * Username/password login backed by the `users` table, HS256 access tokens,
 * and capability checks derived from the role table in [`rbac`] on every
 * request.
 */

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::{
    household,
    user::{self, UserRole, UserStatus},
};

mod password;
mod permissions;
mod rbac;

pub use password::*;
pub use permissions::*;
pub use rbac::*;

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,                  // Subject (user ID)
    pub username: String,             // Login name
    pub roles: Vec<String>,           // Role names such as KE_TOAN
    pub household_id: Option<String>, // Linked household for resident accounts
    pub jti: String,                  // JWT ID
    pub iat: i64,                     // Issued at time
    pub exp: i64,                     // Expiration time
    pub nbf: i64,                     // Not valid before time
    pub iss: String,                  // Issuer
    pub aud: String,                  // Audience
}

/// Authenticated caller, inserted into request extensions by [`auth_middleware`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub roles: Vec<String>,
    /// Re-derived from `roles` on every request
    pub capabilities: Vec<String>,
    pub household_id: Option<Uuid>,
    pub token_id: String,
}

impl AuthUser {
    pub fn has_role(&self, role: UserRole) -> bool {
        let name = role.to_string();
        self.roles.iter().any(|r| *r == name)
    }

    /// Check whether any granted capability covers `required`
    pub fn has_capability(&self, required: &str) -> bool {
        self.capabilities
            .iter()
            .any(|granted| permissions::grants(granted, required))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(UserRole::Admin)
    }

    /// Staff may read any household's obligations, residents only their own.
    pub fn can_read_household_obligations(&self, household_id: Uuid) -> bool {
        self.has_capability(consts::FEE_OBLIGATIONS_READ)
            || (self.has_capability(consts::FEE_OBLIGATIONS_READ_OWN)
                && self.household_id == Some(household_id))
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        access_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            access_token_expiration,
        }
    }

    pub fn from_app_config(cfg: &crate::config::AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            cfg.auth_audience.clone(),
            cfg.auth_issuer.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
        )
    }
}

/// Authentication service that handles login and token issuance
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DatabaseConnection>,
    rbac: RbacService,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self {
            config,
            db,
            rbac: RbacService::new(),
        }
    }

    pub fn rbac(&self) -> &RbacService {
        &self.rbac
    }

    /// Issue an access token for a user
    pub fn generate_token(&self, user: &user::Model) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            roles: vec![user.role.to_string()],
            household_id: user.household_id.map(|id| id.to_string()),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    /// Turns validated claims into the caller identity used by handlers.
    pub fn authenticate(&self, claims: Claims) -> Result<AuthUser, AuthError> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        let household_id = match claims.household_id {
            Some(raw) => Some(Uuid::parse_str(&raw).map_err(|_| AuthError::InvalidToken)?),
            None => None,
        };
        let capabilities = self
            .rbac
            .capabilities_for_roles(&claims.roles)
            .into_iter()
            .collect();

        Ok(AuthUser {
            user_id,
            username: claims.username,
            roles: claims.roles,
            capabilities,
            household_id,
            token_id: claims.jti,
        })
    }

    /// Verify credentials and issue a token.
    ///
    /// Unknown usernames and wrong passwords produce the same error.
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<LoginResponse, AuthError> {
        let db = &*self.db;
        let found = user::Entity::find()
            .filter(user::Column::Username.eq(credentials.username.trim()))
            .one(db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        let account = match found {
            Some(account) if verify_password(&credentials.password, &account.password_hash) => {
                account
            }
            _ => {
                warn!("Rejected login attempt");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if account.status == UserStatus::Locked {
            warn!(user_id = %account.id, "Login attempt on locked account");
            return Err(AuthError::AccountLocked);
        }

        let household_code = match account.household_id {
            Some(household_id) => household::Entity::find_by_id(household_id)
                .one(db)
                .await
                .map_err(|e| AuthError::DatabaseError(e.to_string()))?
                .map(|h| h.household_code),
            None => None,
        };

        let access_token = self.generate_token(&account)?;

        let mut active = account.clone().into_active_model();
        active.last_login_at = Set(Some(Utc::now()));
        if let Err(e) = active.update(db).await {
            warn!(error = %e, "Failed to record last login time");
        }

        let roles = vec![account.role.to_string()];
        let capabilities = self.rbac.capabilities_for_roles(&roles).into_iter().collect();

        info!(user_id = %account.id, role = %account.role, "User logged in");

        Ok(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
            user_id: account.id,
            username: account.username,
            full_name: account.full_name,
            roles,
            capabilities,
            household_id: account.household_id,
            household_code,
        })
    }

    /// Self-service registration; always creates a RESIDENT account.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: RegisterRequest) -> Result<UserInfo, AuthError> {
        request
            .validate()
            .map_err(|e| AuthError::Validation(e.to_string()))?;
        PasswordPolicy::default()
            .validate(&request.password, Some(&request.username))
            .map_err(|e| AuthError::Validation(e.to_string()))?;

        let db = &*self.db;
        let username = request.username.trim().to_string();
        let taken = user::Entity::find()
            .filter(user::Column::Username.eq(username.as_str()))
            .one(db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;
        if taken.is_some() {
            return Err(AuthError::UsernameTaken);
        }

        let household_id = match request.household_code.as_deref() {
            Some(code) => Some(
                household::Entity::find()
                    .filter(household::Column::HouseholdCode.eq(code))
                    .one(db)
                    .await
                    .map_err(|e| AuthError::DatabaseError(e.to_string()))?
                    .ok_or_else(|| {
                        AuthError::Validation(format!("Unknown household code {}", code))
                    })?
                    .id,
            ),
            None => None,
        };

        let password_hash =
            hash_password(&request.password).map_err(|e| AuthError::InternalError(e.to_string()))?;

        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username),
            password_hash: Set(password_hash),
            full_name: Set(request.full_name.trim().to_string()),
            email: Set(request.email),
            phone: Set(request.phone),
            role: Set(UserRole::Resident),
            status: Set(UserStatus::Active),
            household_id: Set(household_id),
            last_login_at: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(|e| match e.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => AuthError::UsernameTaken,
            _ => AuthError::DatabaseError(e.to_string()),
        })?;

        info!(user_id = %model.id, "Resident account registered");
        Ok(UserInfo::from(model))
    }
}

/// Login credentials
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

/// Successful login; `capabilities` drives the console menus.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user_id: Uuid,
    pub username: String,
    pub full_name: String,
    pub roles: Vec<String>,
    pub capabilities: Vec<String>,
    pub household_id: Option<Uuid>,
    pub household_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub full_name: String,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Household to link the resident account to
    pub household_code: Option<String>,
}

/// Public view of an account; never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserInfo {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub household_id: Option<Uuid>,
    pub last_login_at: Option<chrono::DateTime<Utc>>,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<user::Model> for UserInfo {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            full_name: model.full_name,
            email: model.email,
            phone: model.phone,
            role: model.role,
            status: model.status,
            household_id: model.household_id,
            last_login_at: model.last_login_at,
            created_at: model.created_at,
        }
    }
}

/// Caller identity and effective capabilities
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub username: String,
    pub roles: Vec<String>,
    pub capabilities: Vec<String>,
    pub household_id: Option<Uuid>,
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Account is locked")]
    AccountLocked,

    #[error("Username is already taken")]
    UsernameTaken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message): (StatusCode, &str, String) = match &self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                "Authentication required".to_string(),
            ),
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_CREDENTIALS",
                "Invalid username or password".to_string(),
            ),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN",
                "Invalid authentication token".to_string(),
            ),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN_EXPIRED",
                "Token has expired".to_string(),
            ),
            Self::AccountLocked => (
                StatusCode::FORBIDDEN,
                "AUTH_ACCOUNT_LOCKED",
                "Account is locked".to_string(),
            ),
            Self::UsernameTaken => (
                StatusCode::CONFLICT,
                "AUTH_USERNAME_TAKEN",
                "Username is already taken".to_string(),
            ),
            Self::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                "AUTH_INSUFFICIENT_PERMISSIONS",
                "Insufficient permissions".to_string(),
            ),
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, "AUTH_VALIDATION", msg.clone()),
            Self::TokenCreation(_) | Self::DatabaseError(_) | Self::InternalError(_) => {
                tracing::error!(error = %self, "authentication failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "AUTH_INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": error_code,
                "message": error_message,
            }
        }));

        (status, body).into_response()
    }
}

/// Capability middleware; expects [`auth_middleware`] to have run first.
pub async fn permission_middleware(
    State(required_permission): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    if !user.has_capability(&required_permission) {
        warn!(
            user_id = %user.user_id,
            required = %required_permission,
            "Capability check failed"
        );
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Authentication middleware that validates the bearer token
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return AuthError::InternalError("Authentication service not available".to_string())
                .into_response();
        }
    };

    match extract_auth_from_headers(request.headers(), &auth_service) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<AuthUser, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingAuth)?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(AuthError::MissingAuth)?;

    let claims = auth_service.validate_token(token)?;
    auth_service.authenticate(claims)
}

/// Authentication routes
pub fn auth_routes() -> axum::Router<Arc<AuthService>> {
    axum::Router::new()
        .route("/login", axum::routing::post(login_handler))
        .route("/register", axum::routing::post(register_handler))
        .route(
            "/me",
            axum::routing::get(me_handler).route_layer(axum::middleware::from_fn(auth_middleware)),
        )
        .layer(DefaultBodyLimit::max(1024 * 64))
}

/// Log in with username and password
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginCredentials,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 401, description = "Invalid username or password"),
        (status = 403, description = "Account locked")
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(credentials): Json<LoginCredentials>,
) -> Result<Json<LoginResponse>, AuthError> {
    let response = auth_service.login(&credentials).await?;
    Ok(Json(response))
}

/// Register a resident account
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = UserInfo),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Username taken")
    ),
    tag = "auth"
)]
pub async fn register_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserInfo>), AuthError> {
    let user = auth_service.register(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Current caller and effective capabilities
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Caller identity", body = MeResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn me_handler(Extension(user): Extension<AuthUser>) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: user.user_id,
        username: user.username,
        roles: user.roles,
        capabilities: user.capabilities,
        household_id: user.household_id,
    })
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_permission(self, permission: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_permission(self, permission: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            permission.to_string(),
            permission_middleware,
        ))
        .with_auth()
    }
}
