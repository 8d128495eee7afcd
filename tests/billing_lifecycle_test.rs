mod common;

use axum::http::{Method, StatusCode};
use common::{dec, find_obligation, TestApp};
use condo_api::entities::fee_item::FeeUnit;
use rust_decimal_macros::dec;
use serde_json::json;

const SERVICE: &str = "Phí dịch vụ";
const MANAGEMENT: &str = "Phí quản lý";
const PARKING: &str = "Phí gửi xe";

/// Two households (75 m² with one motorbike, 60 m² without vehicles) and the
/// standard three-item catalog.
async fn building(app: &TestApp) {
    let a101 = app.seed_household_with_area("HK-A101", dec!(75)).await;
    app.seed_household_with_area("HK-A102", dec!(60)).await;
    app.seed_vehicle(a101.id, "29B1-12345").await;

    app.seed_fee_item(SERVICE, FeeUnit::M2, dec!(7000)).await;
    app.seed_fee_item(MANAGEMENT, FeeUnit::Fixed, dec!(50000)).await;
    app.seed_fee_item(PARKING, FeeUnit::Slot, dec!(120000)).await;
}

#[tokio::test]
async fn generation_opens_period_and_bills_every_pair() {
    let app = TestApp::new().await;
    building(&app).await;
    let period = app.seed_period("01/2026", 2026, 1).await;

    let (status, body) = app.generate(period.id).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let result = &body["data"];
    assert_eq!(result["period"]["status"], "OPEN");
    assert_eq!(result["obligations_created"], 5);
    assert_eq!(dec(&result["total_expected"]), dec!(1165000));

    let skipped = result["skipped"].as_array().unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0]["household_code"], "HK-A102");
    assert_eq!(skipped[0]["fee_item_name"], PARKING);
    assert_eq!(skipped[0]["reason"], "no_vehicles");

    let obligations = app.period_obligations(period.id).await;
    assert_eq!(obligations.len(), 5);

    let service = find_obligation(&obligations, "HK-A101", SERVICE);
    assert_eq!(dec(&service["expected_amount"]), dec!(525000));
    assert_eq!(dec(&service["paid_amount"]), dec!(0));
    assert_eq!(service["status"], "UNPAID");
    assert_eq!(service["period_status"], "OPEN");

    assert_eq!(
        dec(&find_obligation(&obligations, "HK-A102", SERVICE)["expected_amount"]),
        dec!(420000)
    );
    assert_eq!(
        dec(&find_obligation(&obligations, "HK-A101", PARKING)["expected_amount"]),
        dec!(120000)
    );
    for code in ["HK-A101", "HK-A102"] {
        assert_eq!(
            dec(&find_obligation(&obligations, code, MANAGEMENT)["expected_amount"]),
            dec!(50000)
        );
    }
}

#[tokio::test]
async fn second_generation_is_rejected_without_duplicates() {
    let app = TestApp::new().await;
    building(&app).await;
    let period = app.seed_period("02/2026", 2026, 2).await;

    let (status, _) = app.generate(period.id).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.generate(period.id).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(app.period_obligations(period.id).await.len(), 5);
}

#[tokio::test]
async fn generation_via_obligation_route_matches_period_route() {
    let app = TestApp::new().await;
    building(&app).await;
    let period = app.seed_period("03/2026", 2026, 3).await;

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/v1/fee-obligations/generate/{}", period.id),
            None,
            &app.tokens.ke_toan,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["obligations_created"], 5);

    let (status, _) = app.generate(period.id).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn moved_out_households_and_inactive_items_are_not_billed() {
    let app = TestApp::new().await;
    let staying = app.seed_household_with_area("HK-C301", dec!(50)).await;
    let leaving = app.seed_household_with_area("HK-C302", dec!(80)).await;
    app.seed_fee_item(SERVICE, FeeUnit::M2, dec!(7000)).await;
    let retired = app.seed_fee_item("Phí cũ", FeeUnit::Fixed, dec!(10000)).await;

    let (status, body) = app
        .call(
            Method::PATCH,
            &format!("/api/v1/households/{}/move-out", leaving.id),
            None,
            &app.tokens.to_truong,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "MOVED_OUT");

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/v1/fee-items/{}", retired.id),
            Some(json!({ "status": "INACTIVE" })),
            &app.tokens.ke_toan,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let period = app.seed_period("04/2026", 2026, 4).await;
    let (status, body) = app.generate(period.id).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["obligations_created"], 1);

    let obligations = app.period_obligations(period.id).await;
    assert_eq!(obligations.len(), 1);
    assert_eq!(obligations[0]["household_id"], staying.id.to_string());
    assert_eq!(dec(&obligations[0]["expected_amount"]), dec!(350000));
}

#[tokio::test]
async fn generation_with_empty_catalog_still_opens_period() {
    let app = TestApp::new().await;
    app.seed_household_with_area("HK-D401", dec!(40)).await;
    let period = app.seed_period("05/2026", 2026, 5).await;

    let (status, body) = app.generate(period.id).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["obligations_created"], 0);
    assert_eq!(body["data"]["period"]["status"], "OPEN");
}

#[tokio::test]
async fn price_changes_do_not_touch_issued_obligations() {
    let app = TestApp::new().await;
    app.seed_household_with_area("HK-E501", dec!(75)).await;
    let item = app.seed_fee_item(SERVICE, FeeUnit::M2, dec!(7000)).await;
    let january = app.seed_period("01/2027", 2027, 1).await;
    app.generate(january.id).await;

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/v1/fee-items/{}", item.id),
            Some(json!({ "cost": "8000" })),
            &app.tokens.ke_toan,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let january_bills = app.period_obligations(january.id).await;
    assert_eq!(dec(&january_bills[0]["expected_amount"]), dec!(525000));

    let february = app.seed_period("02/2027", 2027, 2).await;
    app.generate(february.id).await;
    let february_bills = app.period_obligations(february.id).await;
    assert_eq!(dec(&february_bills[0]["expected_amount"]), dec!(600000));
}

#[tokio::test]
async fn period_moves_forward_only() {
    let app = TestApp::new().await;
    building(&app).await;
    let period = app.seed_period("06/2026", 2026, 6).await;

    // DRAFT cannot be closed
    let (status, _) = app.close(period.id).await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.generate(period.id).await;

    // OPEN cannot be edited or deleted
    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/v1/fee-periods/{}", period.id),
            None,
            &app.tokens.ke_toan,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app.close(period.id).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "CLOSED");

    let (status, _) = app.close(period.id).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app.generate(period.id).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .call(
            Method::GET,
            &format!("/api/v1/fee-periods/{}", period.id),
            None,
            &app.tokens.ke_toan,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "CLOSED");
}

#[tokio::test]
async fn closing_marks_unpaid_obligations_overdue() {
    let app = TestApp::new().await;
    building(&app).await;
    let period = app.seed_period("07/2026", 2026, 7).await;
    app.generate(period.id).await;

    let obligations = app.period_obligations(period.id).await;
    let management = find_obligation(&obligations, "HK-A101", MANAGEMENT);
    let (status, _) = app.pay(management["id"].as_str().unwrap(), 50000).await;
    assert_eq!(status, StatusCode::OK);

    app.close(period.id).await;

    let obligations = app.period_obligations(period.id).await;
    let paid = find_obligation(&obligations, "HK-A101", MANAGEMENT);
    assert_eq!(paid["status"], "PAID");
    assert_eq!(paid["overdue"], false);

    let unpaid = find_obligation(&obligations, "HK-A101", SERVICE);
    assert_eq!(unpaid["status"], "UNPAID");
    assert_eq!(unpaid["overdue"], true);
    assert_eq!(unpaid["period_status"], "CLOSED");
}

#[tokio::test]
async fn draft_period_can_be_deleted_and_created_periods_start_draft() {
    let app = TestApp::new().await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/fee-periods",
            Some(json!({
                "name": "08/2026",
                "start_date": "2026-08-01",
                "end_date": "2026-08-31"
            })),
            &app.tokens.ke_toan,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["status"], "DRAFT");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/v1/fee-periods/{}", id),
            None,
            &app.tokens.ke_toan,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .call(
            Method::GET,
            &format!("/api/v1/fee-periods/{}", id),
            None,
            &app.tokens.ke_toan,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn period_with_end_before_start_is_rejected() {
    let app = TestApp::new().await;

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/fee-periods",
            Some(json!({
                "name": "bad",
                "start_date": "2026-09-30",
                "end_date": "2026-09-01"
            })),
            &app.tokens.ke_toan,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_period_cannot_be_generated() {
    let app = TestApp::new().await;
    let (status, _) = app.generate(uuid::Uuid::new_v4()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn manual_obligation_added_to_a_draft_survives_generation() {
    let app = TestApp::new().await;
    building(&app).await;
    let period = app.seed_period("03/2026", 2026, 3).await;

    let (_, households) = app
        .call(
            Method::GET,
            "/api/v1/households?limit=10",
            None,
            &app.tokens.ke_toan,
        )
        .await;
    let a102 = households["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|h| h["household_code"] == "HK-A102")
        .unwrap()["id"]
        .clone();
    let (_, items) = app
        .call(Method::GET, "/api/v1/fee-items", None, &app.tokens.ke_toan)
        .await;
    let management = items["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["name"] == MANAGEMENT)
        .unwrap()["id"]
        .clone();

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/fee-obligations",
            Some(json!({
                "household_id": a102,
                "fee_item_id": management,
                "fee_period_id": period.id,
                "expected_amount": "25000"
            })),
            &app.tokens.ke_toan,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (status, body) = app.generate(period.id).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["period"]["status"], "OPEN");
    assert_eq!(body["data"]["obligations_created"], 4);
    let already_billed: Vec<_> = body["data"]["skipped"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s["reason"] == "already_billed")
        .collect();
    assert_eq!(already_billed.len(), 1);
    assert_eq!(already_billed[0]["household_code"], "HK-A102");

    let obligations = app.period_obligations(period.id).await;
    assert_eq!(obligations.len(), 5);
    assert_eq!(
        dec(&find_obligation(&obligations, "HK-A102", MANAGEMENT)["expected_amount"]),
        dec!(25000)
    );
}
