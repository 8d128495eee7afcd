mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use condo_api::entities::fee_item::FeeUnit;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

async fn leader(
    app: &TestApp,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    app.call(method, uri, body, &app.tokens.to_truong).await
}

async fn add_resident(app: &TestApp, household_id: uuid::Uuid, name: &str, head: bool) -> Value {
    let (status, body) = leader(
        app,
        Method::POST,
        &format!("/api/v1/households/{}/residents", household_id),
        Some(json!({
            "household_id": household_id,
            "full_name": name,
            "relationship_to_head": "Con",
            "is_head": head
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"].clone()
}

#[tokio::test]
async fn apartment_crud_round_trip() {
    let app = TestApp::new().await;

    let (status, body) = leader(
        &app,
        Method::POST,
        "/api/v1/apartments",
        Some(json!({ "block": "B", "floor": 12, "unit": "1203", "area": "68.5" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["status"], "EMPTY");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = leader(
        &app,
        Method::PUT,
        &format!("/api/v1/apartments/{}", id),
        Some(json!({ "status": "MAINTENANCE" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = leader(
        &app,
        Method::GET,
        "/api/v1/apartments/status/maintenance",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);

    let (status, _) = leader(
        &app,
        Method::DELETE,
        &format!("/api/v1/apartments/{}", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = leader(&app, Method::GET, &format!("/api/v1/apartments/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn negative_area_is_rejected() {
    let app = TestApp::new().await;

    let (status, _) = leader(
        &app,
        Method::POST,
        "/api/v1/apartments",
        Some(json!({ "block": "B", "floor": 1, "unit": "0101", "area": "-3" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn household_occupies_and_frees_its_apartment() {
    let app = TestApp::new().await;
    let apartment = app.seed_apartment("0505", Some(dec!(55))).await;

    let (status, body) = leader(
        &app,
        Method::POST,
        "/api/v1/households",
        Some(json!({
            "household_code": "HK-0505",
            "owner_name": "Trần Văn Bảo",
            "apartment_id": apartment.id
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["status"], "ACTIVE");
    let household_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = leader(
        &app,
        Method::GET,
        &format!("/api/v1/apartments/{}", apartment.id),
        None,
    )
    .await;
    assert_eq!(body["data"]["status"], "OCCUPIED");

    let (status, body) = leader(&app, Method::GET, "/api/v1/households/code/HK-0505", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], household_id);

    let (status, _) = leader(
        &app,
        Method::DELETE,
        &format!("/api/v1/households/{}", household_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = leader(
        &app,
        Method::GET,
        &format!("/api/v1/apartments/{}", apartment.id),
        None,
    )
    .await;
    assert_eq!(body["data"]["status"], "EMPTY");
}

#[tokio::test]
async fn duplicate_household_code_conflicts() {
    let app = TestApp::new().await;
    app.seed_household("HK-DUP", None).await;

    let (status, _) = leader(
        &app,
        Method::POST,
        "/api/v1/households",
        Some(json!({ "household_code": "HK-DUP", "owner_name": "Someone" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn moving_out_twice_is_rejected() {
    let app = TestApp::new().await;
    let household = app.seed_household("HK-MOVE", None).await;
    let uri = format!("/api/v1/households/{}/move-out", household.id);

    let (status, _) = leader(&app, Method::PATCH, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = leader(&app, Method::PATCH, &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn one_head_per_household() {
    let app = TestApp::new().await;
    let household = app.seed_household("HK-HEAD", None).await;

    let first = add_resident(&app, household.id, "Nguyễn Văn Một", true).await;
    let second = add_resident(&app, household.id, "Nguyễn Văn Hai", true).await;
    assert_eq!(second["relationship_to_head"], "Chủ hộ");

    let (_, body) = leader(
        &app,
        Method::GET,
        &format!("/api/v1/residents/{}/is-head", first["id"].as_str().unwrap()),
        None,
    )
    .await;
    assert_eq!(body["data"]["is_head"], false);

    let (_, body) = leader(
        &app,
        Method::GET,
        &format!("/api/v1/residents/{}", first["id"].as_str().unwrap()),
        None,
    )
    .await;
    assert_eq!(body["data"]["relationship_to_head"], "Thành viên");

    let (_, details) = leader(
        &app,
        Method::GET,
        &format!("/api/v1/households/{}/details", household.id),
        None,
    )
    .await;
    assert_eq!(details["data"]["household"]["owner_name"], "Nguyễn Văn Hai");
    let heads = details["data"]["residents"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|r| r["is_head"] == true)
        .count();
    assert_eq!(heads, 1);
}

#[tokio::test]
async fn head_cannot_be_deleted_but_can_be_transferred() {
    let app = TestApp::new().await;
    let household = app.seed_household("HK-XFER", None).await;
    let head = add_resident(&app, household.id, "Lê Văn Cũ", true).await;
    let member = add_resident(&app, household.id, "Lê Thị Mới", false).await;
    let head_id = head["id"].as_str().unwrap();
    let member_id = member["id"].as_str().unwrap();

    let (status, _) = leader(
        &app,
        Method::DELETE,
        &format!("/api/v1/residents/{}", head_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = leader(
        &app,
        Method::DELETE,
        &format!("/api/v1/residents/{}/transfer-head/{}", head_id, member_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["is_head"], true);

    let (status, _) = leader(
        &app,
        Method::GET,
        &format!("/api/v1/residents/{}", head_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = leader(
        &app,
        Method::GET,
        &format!("/api/v1/households/{}", household.id),
        None,
    )
    .await;
    assert_eq!(body["data"]["owner_name"], "Lê Thị Mới");
}

#[tokio::test]
async fn transfer_across_households_is_rejected() {
    let app = TestApp::new().await;
    let one = app.seed_household("HK-ONE", None).await;
    let two = app.seed_household("HK-TWO", None).await;
    let head = add_resident(&app, one.id, "Chủ Hộ Một", true).await;
    let stranger = add_resident(&app, two.id, "Người Khác", false).await;

    let (status, _) = leader(
        &app,
        Method::DELETE,
        &format!(
            "/api/v1/residents/{}/transfer-head/{}",
            head["id"].as_str().unwrap(),
            stranger["id"].as_str().unwrap()
        ),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn vehicle_plates_are_normalized_and_unique() {
    let app = TestApp::new().await;
    let household = app.seed_household("HK-CAR", None).await;

    let (status, body) = leader(
        &app,
        Method::POST,
        &format!("/api/v1/households/{}/vehicles", household.id),
        Some(json!({
            "household_id": household.id,
            "vehicle_type": "CAR",
            "plate": " 30a-678.90 "
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["plate"], "30A-678.90");
    assert_eq!(body["data"]["status"], "ACTIVE");

    let (status, _) = leader(
        &app,
        Method::POST,
        "/api/v1/vehicles",
        Some(json!({
            "household_id": household.id,
            "vehicle_type": "CAR",
            "plate": "30A-678.90"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = leader(
        &app,
        Method::GET,
        &format!("/api/v1/vehicles/household/{}", household.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
}

#[tokio::test]
async fn billed_fee_item_cannot_be_deleted() {
    let app = TestApp::new().await;
    app.seed_household_with_area("HK-FEE", dec!(40)).await;
    let billed = app.seed_fee_item("Phí quản lý", FeeUnit::Fixed, dec!(50000)).await;
    let unused = app.seed_fee_item("Phí thử", FeeUnit::Fixed, dec!(1000)).await;
    let period = app.seed_period("09/2026", 2026, 9).await;
    app.generate(period.id).await;

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/v1/fee-items/{}", billed.id),
            None,
            &app.tokens.ke_toan,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .call(
            Method::GET,
            "/api/v1/fee-items/type/service",
            None,
            &app.tokens.ke_toan,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app
        .call(
            Method::GET,
            &format!("/api/v1/fee-items/{}", unused.id),
            None,
            &app.tokens.ke_toan,
        )
        .await;
    assert_eq!(body["data"]["status"], "ACTIVE");
}

#[tokio::test]
async fn notifications_publish_once() {
    let app = TestApp::new().await;

    let (status, body) = leader(
        &app,
        Method::POST,
        "/api/v1/notifications",
        Some(json!({
            "title": "Lịch cắt điện",
            "content": "Tòa A cắt điện 8h-10h thứ Bảy.",
            "notification_type": "WARNING",
            "target_type": "BLOCK",
            "target_value": "A"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["status"], "DRAFT");
    assert_eq!(body["data"]["created_by"], "totruong01");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let uri = format!("/api/v1/notifications/{}/publish", id);
    let (status, body) = leader(&app, Method::PATCH, &uri, None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "PUBLISHED");

    let (status, _) = leader(&app, Method::PATCH, &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = leader(
        &app,
        Method::POST,
        "/api/v1/notifications",
        Some(json!({
            "title": "Thiếu đối tượng",
            "content": "Không có hộ nhận.",
            "notification_type": "INFO",
            "target_type": "HOUSEHOLD"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
