use std::{net::SocketAddr, sync::Arc};

use http::{header, HeaderName, HeaderValue, Method};
use tokio::{signal, sync::mpsc};
use tower_http::{compression::CompressionLayer, cors::CorsLayer};
use tracing::{error, info, warn};

use condo_api as api;
use condo_api::middleware_helpers::request_id::REQUEST_ID_HEADER;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);
    api::handlers::health::init_start_time();

    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate || !cfg.is_production() {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);

    // Domain events are logged and counted off the request path
    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    let app_state = api::AppState::new(db_arc, cfg.clone(), event_sender);

    let cors_layer = cors_layer(&cfg)?;

    let app = api::app_router(app_state)
        .merge(api::openapi::swagger_ui())
        .layer(api::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors_layer);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    info!("condo-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("condo-api stopped");
    Ok(())
}

/// Console origins when listed, permissive in development or on explicit opt-in.
fn cors_layer(cfg: &api::config::AppConfig) -> Result<CorsLayer, Box<dyn std::error::Error>> {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    if !origins.is_empty() {
        return Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers([
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                HeaderName::from_static(REQUEST_ID_HEADER),
            ])
            .allow_credentials(cfg.cors_allow_credentials));
    }
    if cfg.should_allow_permissive_cors() {
        info!(environment = %cfg.environment, "no console origins configured, CORS is permissive");
        return Ok(CorsLayer::permissive());
    }
    Err("no usable CORS origins: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true".into())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
