//! Liveness endpoint handler.

use crate::api::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Liveness response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub engines: EngineCounts,
}

/// Engine counts.
#[derive(Debug, Serialize, Deserialize)]
pub struct EngineCounts {
    pub total: usize,
    pub usable: usize,
}

/// GET /health - `ok` while at least one engine is usable.
pub async fn handle(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let total = state.registry.engine_count();
    let usable = state.router().usable_engines().len();

    let status = if usable > 0 { "ok" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        uptime_seconds: state.metrics_collector.uptime_seconds(),
        engines: EngineCounts { total, usable },
    })
}
