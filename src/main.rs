// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::collections::HashMap;
use std::{net::SocketAddr, sync::Arc};

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::application::session::CollarSession;
use crate::application::telemetry_source::TelemetrySource;
use crate::infrastructure::config::{load_app_config, TransportKind};
use crate::infrastructure::polling_source::PollingSource;
use crate::infrastructure::stomp_source::StompSource;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    get_view, health_check, list_collars, stream_view, trigger_deterrent,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = load_app_config()?;

    // Pick the ingestion transport (infrastructure layer)
    let source: Arc<dyn TelemetrySource> = match config.telemetry.transport {
        TransportKind::Poll => Arc::new(PollingSource::new(config.telemetry.base_url.clone())),
        TransportKind::Stream => Arc::new(StompSource::new(config.telemetry.broker_addr.clone())),
    };

    // Start one session per tracked collar (application layer)
    let mut sessions = HashMap::new();
    for collar_id in &config.telemetry.collar_ids {
        let handle = CollarSession::spawn(collar_id.clone(), source.as_ref(), config.bounds).await;
        sessions.insert(collar_id.clone(), handle);
    }

    // Create application state
    let state = Arc::new(AppState { sessions });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/collars", get(list_collars))
        .route("/collars/:id/view", get(get_view))
        .route("/collars/:id/stream", get(stream_view))
        .route("/collars/:id/deterrents/:kind", post(trigger_deterrent))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config.server.bind_addr.parse()?;
    tracing::info!(%addr, "starting straywatch-telemetry service");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
