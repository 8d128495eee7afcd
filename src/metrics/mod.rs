/*!
 * # Metrics Module
 *
 * Prometheus counters for the billing lifecycle and HTTP traffic, collected
 * in a process-wide registry and exposed in text format at `/metrics`.
 */

use axum::{
    extract::{MatchedPath, Request},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::time::Instant;
use tracing::error;

lazy_static! {
    pub static ref FEE_PERIODS_GENERATED: IntCounter = IntCounter::new(
        "condo_fee_periods_generated_total",
        "Fee periods moved from DRAFT to OPEN by generation"
    )
    .expect("metric can be created");
    pub static ref FEE_PERIODS_CLOSED: IntCounter = IntCounter::new(
        "condo_fee_periods_closed_total",
        "Fee periods moved from OPEN to CLOSED"
    )
    .expect("metric can be created");
    pub static ref OBLIGATIONS_CREATED: IntCounter = IntCounter::new(
        "condo_fee_obligations_created_total",
        "Fee obligations written by generation or manual creation"
    )
    .expect("metric can be created");
    pub static ref PAYMENTS_RECORDED: IntCounter = IntCounter::new(
        "condo_payments_recorded_total",
        "Payments accepted against fee obligations"
    )
    .expect("metric can be created");
    pub static ref PAYMENT_AMOUNT: IntCounter = IntCounter::new(
        "condo_payment_amount_total",
        "Sum of accepted payments in whole currency units"
    )
    .expect("metric can be created");
    pub static ref STATE_GUARD_REJECTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "condo_state_guard_rejections_total",
            "Operations rejected because of the current lifecycle state"
        ),
        &["operation"]
    )
    .expect("metric can be created");
    pub static ref HTTP_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("condo_http_requests_total", "HTTP requests by route and status"),
        &["method", "route", "status"]
    )
    .expect("metric can be created");
    pub static ref HTTP_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "condo_http_request_duration_seconds",
            "HTTP request latency by route"
        ),
        &["method", "route"]
    )
    .expect("metric can be created");
    pub static ref REGISTRY: Registry = {
        let registry = Registry::new();
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(FEE_PERIODS_GENERATED.clone()),
            Box::new(FEE_PERIODS_CLOSED.clone()),
            Box::new(OBLIGATIONS_CREATED.clone()),
            Box::new(PAYMENTS_RECORDED.clone()),
            Box::new(PAYMENT_AMOUNT.clone()),
            Box::new(STATE_GUARD_REJECTIONS.clone()),
            Box::new(HTTP_REQUESTS.clone()),
            Box::new(HTTP_REQUEST_DURATION.clone()),
        ];
        for collector in collectors {
            if let Err(e) = registry.register(collector) {
                error!(error = %e, "Failed to register metric");
            }
        }
        registry
    };
}

/// Records a rejected lifecycle operation (`generate`, `close`, `pay`, ...).
pub fn record_state_guard_rejection(operation: &str) {
    STATE_GUARD_REJECTIONS.with_label_values(&[operation]).inc();
}

/// Records an accepted payment. Fractions are dropped for the amount counter.
pub fn record_payment(amount: Decimal) {
    PAYMENTS_RECORDED.inc();
    if let Some(units) = amount.trunc().to_u64() {
        PAYMENT_AMOUNT.inc_by(units);
    }
}

/// Renders the registry in the Prometheus text exposition format.
pub fn render() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| e.to_string())?;
    String::from_utf8(buffer).map_err(|e| e.to_string())
}

/// `GET /metrics`
pub async fn metrics_handler() -> Response {
    match render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Counts requests and observes latency per matched route.
pub async fn track_http_metrics(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    HTTP_REQUESTS
        .with_label_values(&[&method, &route, response.status().as_str()])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &route])
        .observe(start.elapsed().as_secs_f64());

    response
}
