//! Health check handler

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use pulse_core::GeneratorBackend;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Whether the insight cache answers a ping
    pub cache: bool,
    pub cache_backend: &'static str,
    pub model: String,
    pub version: String,
    pub environment: String,
    pub timestamp: String,
}

/// GET /health - Liveness and cache reachability
///
/// Always reports healthy while the process serves requests; an unreachable
/// cache only degrades insight latency.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let generator = state.analyzer.orchestrator().generator();

    Json(HealthResponse {
        status: "healthy",
        cache: state.cache.ping().await,
        cache_backend: state.cache.backend_name(),
        model: generator.model().to_string(),
        version: state.config.app.version.clone(),
        environment: state.config.app.environment.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
