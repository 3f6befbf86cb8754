//! HTTP server for health and metrics endpoints

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use eyre::eyre;
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use tracing::info;

use crate::metrics;
use crate::shutdown::Shutdown;

/// Static facts about this orchestrator reported by `/health`
#[derive(Debug, Clone, Serialize)]
pub struct NodeInfo {
    pub mode: String,
    pub orchestrator_address: String,
    pub eth_address: String,
}

#[derive(Clone)]
struct AppState {
    node: Arc<NodeInfo>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(flatten)]
    node: NodeInfo,
    last_observed_eth_height: u64,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        node: state.node.as_ref().clone(),
        last_observed_eth_height: metrics::LAST_OBSERVED_ETH_HEIGHT.get() as u64,
    })
}

/// Liveness probe (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

async fn prometheus_metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response();
    }

    ([(header::CONTENT_TYPE, encoder.format_type().to_string())], buffer).into_response()
}

fn router(node: NodeInfo) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .route("/metrics", get(prometheus_metrics))
        .with_state(AppState {
            node: Arc::new(node),
        })
}

/// Serve `/health`, `/healthz` and `/metrics` until shutdown
pub async fn start_server(
    bind_address: &str,
    port: u16,
    node: NodeInfo,
    shutdown: Shutdown,
) -> eyre::Result<()> {
    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .map_err(|e| eyre!("Invalid bind address {}:{}: {}", bind_address, port, e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Health server listening");
    metrics::UP.set(1.0);

    axum::serve(listener, router(node))
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;

    metrics::UP.set(0.0);
    Ok(())
}
