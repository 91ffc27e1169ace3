//! `/metrics` and `/health` endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use secwatch_core::collaborators::CycleReport;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::metrics::MonitorMetrics;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    cycles: u64,
    last_cycle: Option<CycleReport>,
}

async fn health_check(State(metrics): State<Arc<MonitorMetrics>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        cycles: metrics.cycles_completed(),
        last_cycle: metrics.last_report(),
    })
}

async fn prometheus_metrics(State(metrics): State<Arc<MonitorMetrics>>) -> Response {
    match metrics.render() {
        Ok(body) => ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn router(metrics: Arc<MonitorMetrics>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(prometheus_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

/// A running metrics endpoint.
pub struct MetricsServer {
    addr: SocketAddr,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl MetricsServer {
    /// Serve `router(metrics)` on an already-bound listener until
    /// [`shutdown`](Self::shutdown) is called.
    pub fn spawn(listener: TcpListener, metrics: Arc<MonitorMetrics>) -> std::io::Result<Self> {
        let addr = listener.local_addr()?;
        let cancel = CancellationToken::new();
        let stop = cancel.clone();

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router(metrics))
                .with_graceful_shutdown(async move { stop.cancelled().await })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Metrics server error");
            }
        });

        tracing::info!(%addr, "Metrics endpoint listening");
        Ok(Self { addr, cancel, handle })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait briefly for the server task.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if tokio::time::timeout(Duration::from_secs(5), self.handle).await.is_err() {
            tracing::warn!("Metrics server did not stop within 5s");
        }
    }
}
