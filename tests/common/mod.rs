#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use condo_api::{
    auth::LoginCredentials,
    config::AppConfig,
    db,
    entities::{
        apartment,
        fee_item::{self, FeeType, FeeUnit},
        fee_period, household,
        user::UserRole,
        vehicle::{self, VehicleType},
    },
    events::{self, EventSender},
    services::{
        apartments::CreateApartmentRequest, fee_items::CreateFeeItemRequest,
        fee_periods::CreateFeePeriodRequest, households::CreateHouseholdRequest,
        users::CreateUserRequest, vehicles::CreateVehicleRequest,
    },
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str =
    "integration-test-secret-7f3a9c1e5b2d8f4a6c0e9b7d5f3a1c8e6b4d2f0a9c7e5b3d1f8a6c4e2b0d9f7";

/// Staff accounts created for every test app.
pub struct Tokens {
    pub admin: String,
    pub ke_toan: String,
    pub to_truong: String,
}

/// Application router over a fresh in-memory SQLite store.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub tokens: Tokens,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = db::connect_in_memory()
            .await
            .expect("in-memory database with schema");

        let cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));
        let state = AppState::new(Arc::new(pool), cfg, EventSender::new(event_tx));
        let router = condo_api::app_router(state.clone());

        let mut app = Self {
            router,
            state,
            tokens: Tokens {
                admin: String::new(),
                ke_toan: String::new(),
                to_truong: String::new(),
            },
            _event_task: event_task,
        };

        app.tokens.admin = app.account("admin01", UserRole::Admin, None).await;
        app.tokens.ke_toan = app.account("ketoan01", UserRole::KeToan, None).await;
        app.tokens.to_truong = app.account("totruong01", UserRole::ToTruong, None).await;
        app
    }

    /// Creates an account and logs it in, returning the bearer token.
    pub async fn account(
        &self,
        username: &str,
        role: UserRole,
        household_id: Option<Uuid>,
    ) -> String {
        let password = "river-Stone-93";
        self.state
            .services
            .users
            .create_user(CreateUserRequest {
                username: username.to_string(),
                password: password.to_string(),
                full_name: format!("Test {}", username),
                email: None,
                phone: None,
                role,
                status: None,
                household_id,
            })
            .await
            .expect("create test account");

        self.state
            .auth
            .login(&LoginCredentials {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await
            .expect("login test account")
            .access_token
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("serialize request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Sends a request and returns the status with the parsed JSON body
    /// (`Value::Null` for empty bodies).
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: &str,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, body, Some(token)).await;
        let status = response.status();
        (status, response_json(response).await)
    }

    // Seeding goes through the services so each test only drives the route under test.

    pub async fn seed_apartment(&self, unit: &str, area: Option<Decimal>) -> apartment::Model {
        self.state
            .services
            .apartments
            .create_apartment(CreateApartmentRequest {
                block: "A".to_string(),
                floor: 1,
                unit: unit.to_string(),
                area,
                status: None,
            })
            .await
            .expect("seed apartment")
    }

    pub async fn seed_household(
        &self,
        code: &str,
        apartment_id: Option<Uuid>,
    ) -> household::Model {
        self.state
            .services
            .households
            .create_household(CreateHouseholdRequest {
                household_code: code.to_string(),
                owner_name: format!("Owner {}", code),
                phone: None,
                address: None,
                move_in_date: None,
                status: None,
                apartment_id,
            })
            .await
            .expect("seed household")
    }

    /// Household living in a fresh apartment of the given area.
    pub async fn seed_household_with_area(&self, code: &str, area: Decimal) -> household::Model {
        let apartment = self.seed_apartment(code, Some(area)).await;
        self.seed_household(code, Some(apartment.id)).await
    }

    pub async fn seed_vehicle(&self, household_id: Uuid, plate: &str) -> vehicle::Model {
        self.state
            .services
            .vehicles
            .create_vehicle(CreateVehicleRequest {
                household_id,
                vehicle_type: VehicleType::Motorbike,
                plate: plate.to_string(),
                brand: None,
                color: None,
                status: None,
            })
            .await
            .expect("seed vehicle")
    }

    pub async fn seed_fee_item(&self, name: &str, unit: FeeUnit, cost: Decimal) -> fee_item::Model {
        let fee_type = if unit == FeeUnit::Slot {
            FeeType::Vehicle
        } else {
            FeeType::Service
        };
        self.state
            .services
            .fee_items
            .create_fee_item(CreateFeeItemRequest {
                name: name.to_string(),
                fee_type,
                unit,
                cost,
                status: None,
                description: None,
            })
            .await
            .expect("seed fee item")
    }

    pub async fn seed_period(&self, name: &str, year: i32, month: u32) -> fee_period::Model {
        let start = NaiveDate::from_ymd_opt(year, month, 1).expect("valid start");
        let end = start
            .checked_add_months(chrono::Months::new(1))
            .and_then(|d| d.pred_opt())
            .expect("valid end");
        self.state
            .services
            .fee_periods
            .create_fee_period(CreateFeePeriodRequest {
                name: name.to_string(),
                start_date: start,
                end_date: end,
            })
            .await
            .expect("seed fee period")
    }

    /// Generates obligations over HTTP as the accountant.
    pub async fn generate(&self, period_id: Uuid) -> (StatusCode, Value) {
        self.call(
            Method::POST,
            &format!("/api/v1/fee-periods/{}/generate", period_id),
            None,
            &self.tokens.ke_toan,
        )
        .await
    }

    pub async fn close(&self, period_id: Uuid) -> (StatusCode, Value) {
        self.call(
            Method::PATCH,
            &format!("/api/v1/fee-periods/{}/close", period_id),
            None,
            &self.tokens.ke_toan,
        )
        .await
    }

    pub async fn pay(&self, obligation_id: &str, amount: i64) -> (StatusCode, Value) {
        self.call(
            Method::PATCH,
            &format!("/api/v1/fee-obligations/{}/pay", obligation_id),
            Some(json!({
                "paid_amount": amount.to_string(),
                "payment_method": "CASH",
                "payer_name": "Người nộp"
            })),
            &self.tokens.ke_toan,
        )
        .await
    }

    /// Every obligation of a period, as JSON views.
    pub async fn period_obligations(&self, period_id: Uuid) -> Vec<Value> {
        let (status, body) = self
            .call(
                Method::GET,
                &format!("/api/v1/fee-obligations/period/{}?limit=100", period_id),
                None,
                &self.tokens.ke_toan,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["items"]
            .as_array()
            .cloned()
            .unwrap_or_default()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("json response")
}

/// Reads a decimal that may be serialized as a string or a number.
pub fn dec(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a decimal: {other}"),
    }
}

/// The obligation of `household_code` for `fee_item_name` in a list of views.
pub fn find_obligation<'a>(
    obligations: &'a [Value],
    household_code: &str,
    fee_item_name: &str,
) -> &'a Value {
    obligations
        .iter()
        .find(|o| o["household_code"] == household_code && o["fee_item_name"] == fee_item_name)
        .unwrap_or_else(|| panic!("no obligation for {household_code}/{fee_item_name}"))
}
