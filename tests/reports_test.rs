mod common;

use axum::http::{Method, StatusCode};
use common::{dec, find_obligation, TestApp};
use condo_api::entities::fee_item::FeeUnit;
use rust_decimal_macros::dec;
use serde_json::Value;

const CLEANING: &str = "Phí vệ sinh";

/// December 2025 billed to two households, one fully paid and one half paid,
/// then closed. January 2026 is left in DRAFT.
async fn december_closed(app: &TestApp) -> (uuid::Uuid, uuid::Uuid) {
    app.seed_household_with_area("HK-R101", dec!(60)).await;
    app.seed_household_with_area("HK-R102", dec!(90)).await;
    app.seed_fee_item(CLEANING, FeeUnit::Fixed, dec!(100000))
        .await;

    let december = app.seed_period("12/2025", 2025, 12).await;
    app.generate(december.id).await;
    let obligations = app.period_obligations(december.id).await;
    for (code, amount) in [("HK-R101", 100000), ("HK-R102", 50000)] {
        let id = find_obligation(&obligations, code, CLEANING)["id"]
            .as_str()
            .unwrap()
            .to_string();
        let (status, body) = app.pay(&id, amount).await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }
    app.close(december.id).await;

    let january = app.seed_period("01/2026", 2026, 1).await;
    (december.id, january.id)
}

async fn get(app: &TestApp, uri: &str) -> (StatusCode, Value) {
    app.call(Method::GET, uri, None, &app.tokens.ke_toan).await
}

#[tokio::test]
async fn summary_for_month_reports_collection() {
    let app = TestApp::new().await;
    let (december, _) = december_closed(&app).await;

    let (status, body) = get(&app, "/api/v1/reports/summary?periodYm=2025-12").await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let summary = &body["data"];
    assert_eq!(summary["period_id"], december.to_string());
    assert_eq!(summary["period_name"], "12/2025");
    assert_eq!(dec(&summary["total_receivable"]), dec!(200000));
    assert_eq!(dec(&summary["total_collected"]), dec!(150000));
    assert_eq!(summary["collection_rate"], 75.0);
    assert_eq!(summary["total_households"], 2);
    assert_eq!(summary["total_fees"], 1);
}

#[tokio::test]
async fn summary_accepts_period_id_and_formatted_month() {
    let app = TestApp::new().await;
    let (december, _) = december_closed(&app).await;

    let (status, by_id) = get(
        &app,
        &format!("/api/v1/reports/summary?periodId={}", december),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, by_name) = get(&app, "/api/v1/reports/summary?periodYm=12/2025").await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(by_id["data"]["total_collected"], by_name["data"]["total_collected"]);
    assert_eq!(by_name["data"]["period_name"], "12/2025");
}

#[tokio::test]
async fn summary_for_unknown_month_is_zero() {
    let app = TestApp::new().await;
    december_closed(&app).await;

    let (status, body) = get(&app, "/api/v1/reports/summary?periodYm=2030-01").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["data"]["period_id"].is_null());
    assert_eq!(dec(&body["data"]["total_receivable"]), dec!(0));
    assert_eq!(body["data"]["collection_rate"], 0.0);
}

#[tokio::test]
async fn summary_rejects_malformed_selectors() {
    let app = TestApp::new().await;

    for selector in ["2025-13", "december", "2025-0", "hello/world", "13/2025"] {
        let (status, _) = get(
            &app,
            &format!("/api/v1/reports/summary?periodYm={}", selector),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{selector}");
    }

    let (status, _) = get(
        &app,
        &format!("/api/v1/reports/summary?periodId={}", uuid::Uuid::new_v4()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn summary_without_scope_covers_all_periods() {
    let app = TestApp::new().await;
    december_closed(&app).await;

    let (status, body) = get(&app, "/api/v1/reports/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["period_name"].is_null());
    assert_eq!(dec(&body["data"]["total_receivable"]), dec!(200000));
}

#[tokio::test]
async fn analytics_ranks_payers_of_previous_period() {
    let app = TestApp::new().await;
    december_closed(&app).await;

    let (status, body) = get(&app, "/api/v1/reports/analytics").await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let analytics = &body["data"];
    let names: Vec<&str> = analytics["last_periods"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["period_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["12/2025", "01/2026"]);

    assert_eq!(analytics["previous_period_name"], "12/2025");
    assert_eq!(analytics["best_paying_household"]["household_code"], "HK-R101");
    assert_eq!(analytics["best_paying_household"]["payment_rate"], 100.0);
    assert_eq!(analytics["worst_paying_household"]["household_code"], "HK-R102");
    assert_eq!(analytics["worst_paying_household"]["payment_rate"], 50.0);
}

#[tokio::test]
async fn analytics_on_empty_store_has_no_ranking() {
    let app = TestApp::new().await;

    let (status, body) = get(&app, "/api/v1/reports/analytics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["last_periods"].as_array().unwrap().len(), 0);
    assert!(body["data"]["best_paying_household"].is_null());
}

#[tokio::test]
async fn household_stats_list_each_payer() {
    let app = TestApp::new().await;
    let (december, january) = december_closed(&app).await;

    let (status, body) = get(
        &app,
        &format!("/api/v1/reports/periods/{}/households", december),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let stats = body["data"].as_array().unwrap();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0]["household_code"], "HK-R101");
    assert_eq!(stats[0]["apartment"], "A-1-HK-R101");
    assert_eq!(dec(&stats[1]["total_paid"]), dec!(50000));

    let (_, body) = get(
        &app,
        &format!("/api/v1/reports/periods/{}/households", january),
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn dashboard_counts_registry_and_ledger() {
    let app = TestApp::new().await;
    december_closed(&app).await;
    app.seed_apartment("B-0901", None).await;

    let (status, body) = get(&app, "/api/v1/dashboard").await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let stats = &body["data"];
    assert_eq!(stats["total_households"], 2);
    assert_eq!(stats["total_apartments"], 3);
    assert_eq!(stats["occupied_apartments"], 2);
    assert_eq!(stats["empty_apartments"], 1);
    assert_eq!(dec(&stats["total_collected"]), dec!(150000));
    assert_eq!(stats["collection_rate"], 75.0);
}
