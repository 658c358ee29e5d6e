// HTTP server for the Prometheus metrics endpoint
//
// Routes:
//   /metrics - Prometheus text format
//   /healthz - liveness plus a capability and tool availability report

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::metrics;
use crate::tools::{Capabilities, ToolRegistry};

/// Data reported by `/healthz`
#[derive(Debug)]
pub struct HealthState {
    started: Instant,
    capabilities: Capabilities,
    tools_total: usize,
    tools_available: usize,
}

impl HealthState {
    pub fn new(registry: &ToolRegistry, capabilities: Capabilities) -> Self {
        let infos = registry.infos(&capabilities);
        Self {
            started: Instant::now(),
            capabilities,
            tools_total: infos.len(),
            tools_available: infos.iter().filter(|i| i.is_available()).count(),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    capabilities: Capabilities,
    tools_total: usize,
    tools_available: usize,
}

/// Router serving `/metrics` and `/healthz`
pub fn router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the metrics HTTP server
///
/// Runs until the listener fails.
pub async fn start_metrics_server(bind: IpAddr, port: u16, state: HealthState) -> Result<()> {
    metrics::init().context("Failed to initialize metrics")?;

    let app = router(Arc::new(state));
    let addr = SocketAddr::new(bind, port);

    info!("Starting metrics server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind metrics server to {}", addr))?;

    axum::serve(listener, app)
        .await
        .context("Metrics server error")?;

    Ok(())
}

async fn metrics_handler(State(state): State<Arc<HealthState>>) -> Response {
    metrics::UPTIME_SECONDS.set(state.started.elapsed().as_secs() as i64);
    match metrics::gather_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error gathering metrics".to_string(),
            )
                .into_response()
        }
    }
}

async fn health_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    Json(HealthReport {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started.elapsed().as_secs(),
        capabilities: state.capabilities,
        tools_total: state.tools_total,
        tools_available: state.tools_available,
    })
}
