//! Condo API Library
//!
//! Apartment registry and monthly fee billing: periods move DRAFT → OPEN → CLOSED,
//! opening a period fans obligations out to every active household, and payments
//! settle those obligations.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod commands;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod metrics;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::State,
    response::Json,
    routing::{delete, get, patch, post, put},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::consts as perm;
use crate::auth::{AuthRouterExt, AuthService};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub services: handlers::AppServices,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Wires services, auth and the event sender around one connection pool.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let event_sender = Arc::new(event_sender);
        let auth = Arc::new(AuthService::new(
            auth::AuthConfig::from_app_config(&config),
            db.clone(),
        ));
        let services = handlers::AppServices::new(db.clone(), event_sender.clone());
        Self {
            db,
            config,
            event_sender,
            services,
            auth,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

fn registry_routes() -> Router<AppState> {
    use handlers::{apartments, households, residents, vehicles};

    let apartments_read = Router::new()
        .route("/apartments", get(apartments::list_apartments))
        .route("/apartments/:id", get(apartments::get_apartment))
        .route(
            "/apartments/status/:status",
            get(apartments::list_apartments_by_status),
        )
        .with_permission(perm::APARTMENTS_READ);

    let apartments_write = Router::new()
        .route("/apartments", post(apartments::create_apartment))
        .route(
            "/apartments/:id",
            put(apartments::update_apartment).delete(apartments::delete_apartment),
        )
        .with_permission(perm::APARTMENTS_WRITE);

    let households_read = Router::new()
        .route("/households", get(households::list_households))
        .route("/households/:id", get(households::get_household))
        .route(
            "/households/status/:status",
            get(households::list_households_by_status),
        )
        .route(
            "/households/code/:code",
            get(households::get_household_by_code),
        )
        .route(
            "/households/:id/details",
            get(households::get_household_details),
        )
        .with_permission(perm::HOUSEHOLDS_READ);

    let households_write = Router::new()
        .route("/households", post(households::create_household))
        .route(
            "/households/:id",
            put(households::update_household).delete(households::delete_household),
        )
        .route(
            "/households/:id/move-out",
            patch(households::move_out_household),
        )
        .with_permission(perm::HOUSEHOLDS_WRITE);

    let residents_read = Router::new()
        .route("/residents", get(residents::list_residents))
        .route("/residents/:id", get(residents::get_resident))
        .route("/residents/:id/is-head", get(residents::is_head))
        .route(
            "/residents/household/:household_id",
            get(residents::list_residents_by_household),
        )
        .route(
            "/households/:id/residents",
            get(households::list_household_residents),
        )
        .with_permission(perm::RESIDENTS_READ);

    let residents_write = Router::new()
        .route("/residents", post(residents::create_resident))
        .route(
            "/residents/:id",
            put(residents::update_resident).delete(residents::delete_resident),
        )
        .route(
            "/residents/:id/transfer-head/:new_head_id",
            delete(residents::transfer_head),
        )
        .route(
            "/households/:id/residents",
            post(households::add_household_resident),
        )
        .with_permission(perm::RESIDENTS_WRITE);

    let vehicles_read = Router::new()
        .route("/vehicles", get(vehicles::list_vehicles))
        .route("/vehicles/:id", get(vehicles::get_vehicle))
        .route(
            "/vehicles/household/:household_id",
            get(vehicles::list_vehicles_by_household),
        )
        .route(
            "/households/:id/vehicles",
            get(households::list_household_vehicles),
        )
        .with_permission(perm::VEHICLES_READ);

    let vehicles_write = Router::new()
        .route("/vehicles", post(vehicles::create_vehicle))
        .route(
            "/vehicles/:id",
            put(vehicles::update_vehicle).delete(vehicles::delete_vehicle),
        )
        .route(
            "/households/:id/vehicles",
            post(households::add_household_vehicle),
        )
        .with_permission(perm::VEHICLES_WRITE);

    Router::new()
        .merge(apartments_read)
        .merge(apartments_write)
        .merge(households_read)
        .merge(households_write)
        .merge(residents_read)
        .merge(residents_write)
        .merge(vehicles_read)
        .merge(vehicles_write)
}

fn billing_routes() -> Router<AppState> {
    use handlers::{fee_items, fee_obligations, fee_periods};

    let fee_items_read = Router::new()
        .route("/fee-items", get(fee_items::list_fee_items))
        .route("/fee-items/:id", get(fee_items::get_fee_item))
        .route(
            "/fee-items/status/:status",
            get(fee_items::list_fee_items_by_status),
        )
        .route(
            "/fee-items/type/:fee_type",
            get(fee_items::list_fee_items_by_type),
        )
        .with_permission(perm::FEE_ITEMS_READ);

    let fee_items_write = Router::new()
        .route("/fee-items", post(fee_items::create_fee_item))
        .route(
            "/fee-items/:id",
            put(fee_items::update_fee_item).delete(fee_items::delete_fee_item),
        )
        .with_permission(perm::FEE_ITEMS_WRITE);

    let periods_read = Router::new()
        .route("/fee-periods", get(fee_periods::list_fee_periods))
        .route("/fee-periods/current", get(fee_periods::current_fee_period))
        .route("/fee-periods/:id", get(fee_periods::get_fee_period))
        .with_permission(perm::FEE_PERIODS_READ);

    let periods_write = Router::new()
        .route("/fee-periods", post(fee_periods::create_fee_period))
        .route(
            "/fee-periods/:id",
            put(fee_periods::update_fee_period).delete(fee_periods::delete_fee_period),
        )
        .with_permission(perm::FEE_PERIODS_WRITE);

    let periods_generate = Router::new()
        .route(
            "/fee-periods/:id/generate",
            post(fee_periods::generate_obligations),
        )
        .route(
            "/fee-obligations/generate/:period_id",
            post(fee_obligations::generate_for_period),
        )
        .with_permission(perm::FEE_PERIODS_GENERATE);

    let periods_close = Router::new()
        .route("/fee-periods/:id/close", patch(fee_periods::close_fee_period))
        .with_permission(perm::FEE_PERIODS_CLOSE);

    let obligations_read = Router::new()
        .route("/fee-obligations", get(fee_obligations::list_fee_obligations))
        .route("/fee-obligations/:id", get(fee_obligations::get_fee_obligation))
        .route(
            "/fee-obligations/:id/payments",
            get(fee_obligations::list_payments),
        )
        .route(
            "/fee-obligations/period/:period_id",
            get(fee_obligations::list_period_obligations),
        )
        .route(
            "/fee-obligations/status/:status",
            get(fee_obligations::list_obligations_by_status),
        )
        .with_permission(perm::FEE_OBLIGATIONS_READ);

    // Residents reach these too; the handler narrows them to their own household
    let household_obligations = Router::new()
        .route(
            "/fee-obligations/household/:household_id",
            get(fee_obligations::list_household_obligations),
        )
        .route(
            "/households/:id/fee-obligations",
            get(fee_obligations::list_household_obligations),
        )
        .with_auth();

    let obligations_write = Router::new()
        .route("/fee-obligations", post(fee_obligations::create_fee_obligation))
        .route(
            "/fee-obligations/:id",
            put(fee_obligations::update_fee_obligation)
                .delete(fee_obligations::delete_fee_obligation),
        )
        .with_permission(perm::FEE_OBLIGATIONS_WRITE);

    let obligations_pay = Router::new()
        .route(
            "/fee-obligations/:id/pay",
            patch(fee_obligations::pay_fee_obligation),
        )
        .with_permission(perm::FEE_OBLIGATIONS_PAY);

    Router::new()
        .merge(fee_items_read)
        .merge(fee_items_write)
        .merge(periods_read)
        .merge(periods_write)
        .merge(periods_generate)
        .merge(periods_close)
        .merge(obligations_read)
        .merge(household_obligations)
        .merge(obligations_write)
        .merge(obligations_pay)
}

fn console_routes() -> Router<AppState> {
    use handlers::{dashboard, notifications, reports, users};

    let reports = Router::new()
        .route("/dashboard", get(dashboard::dashboard))
        .route("/reports/summary", get(reports::summary))
        .route("/reports/analytics", get(reports::analytics))
        .route(
            "/reports/periods/:period_id/households",
            get(reports::household_stats),
        )
        .with_permission(perm::REPORTS_READ);

    let notifications_read = Router::new()
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/:id", get(notifications::get_notification))
        .route(
            "/notifications/status/:status",
            get(notifications::list_notifications_by_status),
        )
        .with_permission(perm::NOTIFICATIONS_READ);

    let notifications_write = Router::new()
        .route("/notifications", post(notifications::create_notification))
        .route(
            "/notifications/:id",
            put(notifications::update_notification).delete(notifications::delete_notification),
        )
        .with_permission(perm::NOTIFICATIONS_WRITE);

    let notifications_publish = Router::new()
        .route(
            "/notifications/:id/publish",
            patch(notifications::publish_notification),
        )
        .with_permission(perm::NOTIFICATIONS_PUBLISH);

    let users_read = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/:id", get(users::get_user))
        .with_permission(perm::USERS_READ);

    let users_write = Router::new()
        .route("/users", post(users::create_user))
        .route(
            "/users/:id",
            put(users::update_user).delete(users::delete_user),
        )
        .route("/users/:id/password", patch(users::change_password))
        .with_permission(perm::USERS_WRITE);

    Router::new()
        .merge(reports)
        .merge(notifications_read)
        .merge(notifications_write)
        .merge(notifications_publish)
        .merge(users_read)
        .merge(users_write)
}

/// Every `/api/v1` route except `/auth`, each group gated by one capability.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(api_status))
        .merge(registry_routes())
        .merge(billing_routes())
        .merge(console_routes())
}

/// Application router without the outer transport layers (CORS, compression, tracing).
pub fn app_router(state: AppState) -> Router {
    let auth_service = state.auth.clone();

    Router::<AppState>::new()
        .merge(handlers::health::health_routes())
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/api/v1", api_v1_routes())
        .nest(
            "/api/v1/auth",
            auth::auth_routes().with_state(auth_service.clone()),
        )
        .layer(axum::middleware::from_fn(metrics::track_http_metrics))
        // Inject AuthService into request extensions for auth middleware
        .layer(axum::middleware::from_fn_with_state(
            auth_service,
            |axum::extract::State(auth): axum::extract::State<Arc<AuthService>>,
             mut req: axum::extract::Request,
             next: axum::middleware::Next| async move {
                req.extensions_mut().insert(auth);
                next.run(req).await
            },
        ))
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

async fn api_status(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    Json(ApiResponse::success(json!({
        "service": "condo-api",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("period is CLOSED".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert_eq!(response.message.as_deref(), Some("period is CLOSED"));
    }

    #[test]
    fn validation_errors_are_listed() {
        let response = ApiResponse::<()>::validation_errors(vec!["name: required".into()]);
        assert!(!response.success);
        assert_eq!(response.errors, Some(vec!["name: required".to_string()]));
        assert!(response.meta.and_then(|m| m.request_id).is_none());
    }
}
