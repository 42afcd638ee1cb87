use std::sync::Arc;
use axum::{extract::State, Json};
use crate::AppState;
use crate::models::{HealthResponse, ReadyResponse};
use tracing::debug;

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        message: "Server is running".to_string(),
    })
}

/// Readiness check endpoint
pub async fn ready_check(State(state): State<Arc<AppState>>) -> Json<ReadyResponse> {
    debug!("Readiness check requested");
    Json(ReadyResponse {
        status: "ok".to_string(),
        n_live_docs: state.gateway.registry().len().await as u32,
    })
}
