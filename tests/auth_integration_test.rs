//! Login, self-registration, `/auth/me` and account management over HTTP.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use serde_json::{json, Value};

async fn post_public(app: &TestApp, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app.request(Method::POST, uri, Some(body), None).await;
    let status = response.status();
    (status, response_json(response).await)
}

async fn login(app: &TestApp, username: &str, password: &str) -> (StatusCode, Value) {
    post_public(
        app,
        "/api/v1/auth/login",
        json!({ "username": username, "password": password }),
    )
    .await
}

#[tokio::test]
async fn login_issues_bearer_token_with_capabilities() {
    let app = TestApp::new().await;

    let (status, body) = login(&app, "ketoan01", "river-Stone-93").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 3600);
    assert_eq!(body["roles"], json!(["KE_TOAN"]));
    assert!(body["capabilities"]
        .as_array()
        .unwrap()
        .contains(&json!("fee_periods:*")));

    let token = body["access_token"].as_str().unwrap();
    let (status, _) = app.call(Method::GET, "/api/v1/fee-periods", None, token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn wrong_password_and_unknown_user_look_the_same() {
    let app = TestApp::new().await;

    let (status, wrong) = login(&app, "ketoan01", "not-the-password").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, unknown) = login(&app, "nobody", "river-Stone-93").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(wrong["error"]["code"], "AUTH_INVALID_CREDENTIALS");
    assert_eq!(wrong, unknown);
}

#[tokio::test]
async fn me_echoes_caller_identity() {
    let app = TestApp::new().await;

    let (status, body) = app
        .call(Method::GET, "/api/v1/auth/me", None, &app.tokens.admin)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["username"], "admin01");
    assert_eq!(body["roles"], json!(["ADMIN"]));
    assert_eq!(body["capabilities"], json!(["*"]));

    let response = app.request(Method::GET, "/api/v1/auth/me", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tampered_token_is_rejected() {
    let app = TestApp::new().await;
    // Claims start with `{"`, so the payload segment always begins with "eyJ"
    let mut parts: Vec<String> = app.tokens.admin.split('.').map(str::to_string).collect();
    assert!(parts[1].starts_with("eyJ"));
    parts[1].replace_range(0..1, "f");
    let token = parts.join(".");

    let (status, body) = app.call(Method::GET, "/api/v1/users", None, &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{body}");
    assert_eq!(body["error"]["code"], "AUTH_INVALID_TOKEN");
}

#[tokio::test]
async fn registration_creates_resident_linked_to_household() {
    let app = TestApp::new().await;
    let household = app.seed_household("HK-REG", None).await;

    let (status, body) = post_public(
        &app,
        "/api/v1/auth/register",
        json!({
            "username": "cudan.reg",
            "password": "Sunny-Balcony-7",
            "full_name": "Phạm Thị Cư",
            "household_code": "HK-REG"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["role"], "RESIDENT");
    assert_eq!(body["household_id"], household.id.to_string());
    assert!(body.get("password_hash").is_none());

    let (status, body) = login(&app, "cudan.reg", "Sunny-Balcony-7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["household_code"], "HK-REG");

    let (status, _) = post_public(
        &app,
        "/api/v1/auth/register",
        json!({
            "username": "cudan.reg",
            "password": "Another-Pass-8",
            "full_name": "Trùng Tên"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn registration_validates_input() {
    let app = TestApp::new().await;

    let cases = [
        // password contains the username
        json!({ "username": "minh", "password": "minh-12345", "full_name": "Minh" }),
        // too short
        json!({ "username": "lan", "password": "short", "full_name": "Lan" }),
        // unknown household
        json!({
            "username": "hoa",
            "password": "Garden-Path-11",
            "full_name": "Hoa",
            "household_code": "HK-NOPE"
        }),
    ];
    for case in cases {
        let (status, body) = post_public(&app, "/api/v1/auth/register", case.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{case}: {body}");
    }
}

#[tokio::test]
async fn admin_manages_accounts_and_passwords() {
    let app = TestApp::new().await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "username": "ketoan02",
                "password": "Ledger-Book-42",
                "full_name": "Kế Toán Hai",
                "role": "KE_TOAN"
            })),
            &app.tokens.admin,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .call(
            Method::GET,
            "/api/v1/users?role=ke_toan",
            None,
            &app.tokens.admin,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);

    let password_uri = format!("/api/v1/users/{}/password", id);
    let (status, _) = app
        .call(
            Method::PATCH,
            &password_uri,
            Some(json!({ "old_password": "wrong-one", "new_password": "Fresh-Ink-2027" })),
            &app.tokens.admin,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            Method::PATCH,
            &password_uri,
            Some(json!({ "old_password": "Ledger-Book-42", "new_password": "Fresh-Ink-2027" })),
            &app.tokens.admin,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = login(&app, "ketoan02", "Ledger-Book-42").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = login(&app, "ketoan02", "Fresh-Ink-2027").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/v1/users/{}", id),
            Some(json!({ "status": "LOCKED" })),
            &app.tokens.admin,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = login(&app, "ketoan02", "Fresh-Ink-2027").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "AUTH_ACCOUNT_LOCKED");
}
