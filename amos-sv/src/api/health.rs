//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    /// Persistence backend in use ("rows" or "local")
    pub backend: String,
    /// Sessions currently held in memory
    pub live_sessions: usize,
}

/// GET /health
///
/// Health check endpoint for monitoring.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "amos-sv".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.controller.store().backend().to_string(),
        live_sessions: state.registry.len().await,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
