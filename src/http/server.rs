use crate::error::{LagError, Result};
use crate::pipeline::status::PipelineStatus;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

#[derive(Clone)]
struct AppState {
    status: Arc<PipelineStatus>,
}

pub struct HealthServer {
    addr: SocketAddr,
    state: AppState,
}

impl HealthServer {
    pub fn new(host: &str, port: u16, status: Arc<PipelineStatus>) -> Result<Self> {
        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| LagError::Config(format!("invalid health address {host}:{port}: {e}")))?;

        Ok(Self {
            addr,
            state: AppState { status },
        })
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let app = router(self.state);

        info!(addr = %self.addr, "Starting health server");

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| LagError::Http(e.to_string()))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                info!("Health server shutting down");
            })
            .await
            .map_err(|e| LagError::Http(e.to_string()))?;

        Ok(())
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> Response {
    if state.status.is_healthy() {
        (StatusCode::OK, "OK").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Unhealthy").into_response()
    }
}

async fn ready_handler(State(state): State<AppState>) -> Response {
    if state.status.is_ready() {
        (StatusCode::OK, "Ready").into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Not ready - no completed cycle",
        )
            .into_response()
    }
}

async fn status_handler(State(state): State<AppState>) -> Response {
    match state.status.last_report() {
        Some(report) => Json(report).into_response(),
        None => (StatusCode::NO_CONTENT, "").into_response(),
    }
}
