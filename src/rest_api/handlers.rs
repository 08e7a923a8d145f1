//! HTTP handlers for the probe and metrics API

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::{error, instrument};

use crate::controller::ControllerState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub leader: bool,
    pub platform: String,
}

/// Liveness probe
#[instrument]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness probe: 503 until the controllers are watching
#[instrument(skip(state))]
pub async fn ready(State(state): State<Arc<ControllerState>>) -> (StatusCode, Json<ReadyResponse>) {
    let ready = state.is_ready();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadyResponse {
            ready,
            leader: state.is_leader.load(Ordering::Relaxed),
            platform: format!("{:?}", state.platform),
        }),
    )
}

/// Prometheus text exposition of the operator registry
#[cfg(feature = "metrics")]
pub async fn metrics() -> (StatusCode, String) {
    use prometheus_client::encoding::text::encode;

    let mut buffer = String::new();
    match encode(&mut buffer, &crate::controller::metrics::REGISTRY) {
        Ok(()) => (StatusCode::OK, buffer),
        Err(e) => {
            error!("Failed to encode metrics: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}
