//! Main HTTP gateway server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use crate::health_api;
use crate::session::SessionManager;
use crate::ws_server;

/// Application state shared across routes.
#[derive(Clone)]
pub struct GatewayState {
    pub manager: Arc<SessionManager>,
    pub started_at: Instant,
}

impl GatewayState {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self {
            manager,
            started_at: Instant::now(),
        }
    }
}

pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_api::service_info))
        .route("/health", get(health_api::get_health))
        .route("/stats", get(health_api::get_stats))
        .route("/chart-types", get(health_api::chart_types))
        .route("/ws", get(ws_server::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `shutdown` fires, then close every live session.
#[instrument(skip(state, shutdown))]
pub async fn start_server(addr: SocketAddr, state: GatewayState, shutdown: CancellationToken) -> Result<()> {
    let manager = Arc::clone(&state.manager);
    let app = build_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Gateway HTTP server listening");

    let signal = shutdown.clone();
    let closer = tokio::spawn(async move {
        signal.cancelled().await;
        manager.shutdown().await;
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("gateway server failed")?;

    if let Err(e) = closer.await {
        warn!(error = %e, "Session shutdown task failed");
    }
    info!("Gateway HTTP server stopped");
    Ok(())
}
