//! Administrative endpoints for engine configuration and health.

use super::{ApiError, AppState};
use crate::health::{CircuitMetrics, EngineHealth};
use crate::registry::{EngineSettings, EngineUpdate};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

/// Engine settings joined with live health and admission state.
#[derive(Debug, Serialize)]
pub struct EngineView {
    #[serde(flatten)]
    pub settings: EngineSettings,
    pub health: EngineHealth,
    pub circuit: CircuitMetrics,
    pub in_flight: u32,
    pub usable: bool,
}

/// Health snapshot of one engine.
#[derive(Debug, Serialize)]
pub struct EngineHealthView {
    pub engine: String,
    pub health: EngineHealth,
    pub circuit: CircuitMetrics,
}

fn engine_view(state: &AppState, settings: &EngineSettings) -> EngineView {
    let health = state.health();
    EngineView {
        health: (*health.snapshot(&settings.name)).clone(),
        circuit: health.circuit_metrics(&settings.name),
        in_flight: state.admission().in_flight(&settings.name),
        usable: state.router().is_usable(&settings.name),
        settings: settings.clone(),
    }
}

fn health_view(state: &AppState, name: &str) -> Result<EngineHealthView, ApiError> {
    if state.registry.get(name).is_none() {
        return Err(ApiError::engine_not_found(name));
    }
    let health = state.health();
    Ok(EngineHealthView {
        engine: name.to_string(),
        health: (*health.snapshot(name)).clone(),
        circuit: health.circuit_metrics(name),
    })
}

/// GET /admin/engines
pub async fn list_engines(State(state): State<Arc<AppState>>) -> Json<Vec<EngineView>> {
    let engines = state
        .registry
        .all()
        .iter()
        .map(|settings| engine_view(&state, settings))
        .collect();
    Json(engines)
}

/// PATCH /admin/engines/{name}
///
/// A `max_concurrent` change resizes admission capacity: growth applies
/// immediately, a shrink retires permits as in-flight requests finish.
pub async fn update_engine(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    payload: Result<Json<EngineUpdate>, JsonRejection>,
) -> Result<Json<EngineView>, ApiError> {
    let Json(update) = payload.map_err(|e| ApiError::bad_request(&e.body_text()))?;
    let admission = state.admission();
    let committed = state.registry.update_engine_with(&name, &update, |settings| {
        if admission.capacity(&settings.name) != Some(settings.max_concurrent) {
            admission.resize(&settings.name, settings.max_concurrent);
        }
    })?;

    Ok(Json(engine_view(&state, &committed)))
}

/// GET /admin/engines/{name}/health
pub async fn engine_health(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<EngineHealthView>, ApiError> {
    health_view(&state, &name).map(Json)
}

/// POST /admin/engines/{name}/health/reset
pub async fn reset_engine_health(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<EngineHealthView>, ApiError> {
    if state.registry.get(&name).is_none() {
        return Err(ApiError::engine_not_found(&name));
    }
    state.health().reset(&name);
    tracing::info!(engine = %name, "Engine health reset by operator");
    health_view(&state, &name).map(Json)
}
