//! Health check endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use super::{ApiState, ModelInfo};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub version: &'static str,
}

/// Readiness response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub providers: ModelInfo,
    pub rate_limited: bool,
}

/// Liveness check
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        message: "VoiceBot server is running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness check: reports which upstreams the relay was built with
async fn ready(State(state): State<Arc<ApiState>>) -> Json<ReadinessResponse> {
    Json(ReadinessResponse {
        status: "ready",
        providers: state.model_info.clone(),
        rate_limited: state.rate_limiter.is_some(),
    })
}

/// Build health check router
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Build readiness router (requires state)
pub fn ready_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/ready", get(ready))
        .with_state(state)
}
