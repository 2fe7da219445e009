//! Health check endpoints
//!
//! Provides simple health checks for monitoring probes.

use axum::{response::IntoResponse, routing::get, Router};

use super::AppState;

/// Health check router
pub fn create_health_router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/readyz", get(readiness_check))
}

/// Basic liveness check (always returns OK if the server is running)
pub async fn health_check() -> impl IntoResponse {
    "OK"
}

/// Readiness check
pub async fn readiness_check() -> impl IntoResponse {
    "OK"
}
