//! # HTTP API
//!
//! Inbound HTTP surface of the gateway.
//!
//! ## Endpoints
//!
//! - `POST /v1/chat/stream` - Streaming chat (server-sent events)
//! - `GET /admin/engines` - Engine settings with health
//! - `PATCH /admin/engines/{name}` - Partial engine update
//! - `GET /admin/engines/{name}/health` - Health snapshot and circuit metrics
//! - `POST /admin/engines/{name}/health/reset` - Manual health reset
//! - `GET /health` - Liveness
//! - `GET /metrics` - Prometheus metrics
//!
//! ## Example
//!
//! ```no_run
//! use gateway::api::{create_router, AppState};
//! use gateway::config::GatewayConfig;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(GatewayConfig::default());
//! let state = Arc::new(AppState::from_config(config)?);
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Non-streaming errors share one JSON envelope:
//! ```json
//! {
//!   "error": {
//!     "message": "engine not found: gguf",
//!     "type": "invalid_request_error",
//!     "code": "engine_not_found"
//!   }
//! }
//! ```
//! Failures after a stream has been accepted are reported in-band as a
//! terminal `error` event instead.

mod admin;
mod chat;
mod health;
pub mod types;

pub use admin::{EngineHealthView, EngineView};
pub use chat::{resolve_identity, ANONYMOUS_CALLER, CALLER_ID_HEADER, TRACE_ID_HEADER};
pub use health::{EngineCounts, HealthResponse};
pub use types::*;

use crate::admission::AdmissionController;
use crate::config::GatewayConfig;
use crate::gateway::{EngineClient, Gateway, HttpEngineClient};
use crate::health::HealthMonitor;
use crate::metrics::MetricsCollector;
use crate::registry::{EngineRegistry, RegistryError};
use crate::routing::EngineRouter;
use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Maximum request body size (10 MB).
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub registry: Arc<EngineRegistry>,
    pub gateway: Arc<Gateway>,
    /// Server startup time for uptime tracking
    pub start_time: Instant,
    /// Metrics collector for observability
    pub metrics_collector: Arc<MetricsCollector>,
}

impl AppState {
    /// Wrap already-built components.
    pub fn new(
        config: Arc<GatewayConfig>,
        registry: Arc<EngineRegistry>,
        gateway: Arc<Gateway>,
    ) -> Self {
        let start_time = Instant::now();

        // A second install fails when a recorder already exists (tests, repeated builds)
        let prometheus_handle = crate::metrics::setup_metrics().unwrap_or_else(|e| {
            tracing::debug!("Metrics already initialized, creating new handle: {}", e);
            crate::metrics::detached_handle()
        });

        Self {
            config,
            registry,
            gateway,
            start_time,
            metrics_collector: Arc::new(MetricsCollector::new(start_time, prometheus_handle)),
        }
    }

    /// Build every component from configuration with the reqwest engine client.
    pub fn from_config(config: Arc<GatewayConfig>) -> Result<Self, RegistryError> {
        let timeout = Duration::from_secs(config.server.request_timeout_seconds);
        Self::with_engine_client(config, Arc::new(HttpEngineClient::new(timeout)))
    }

    /// Build every component from configuration, in dependency order:
    /// registry, health monitor, admission controller, router, gateway.
    pub fn with_engine_client(
        config: Arc<GatewayConfig>,
        client: Arc<dyn EngineClient>,
    ) -> Result<Self, RegistryError> {
        let registry = Arc::new(EngineRegistry::from_config(&config.engines)?);
        let health = Arc::new(HealthMonitor::new(
            Arc::clone(&registry),
            config.health_check.clone(),
            config.circuit_breaker.clone(),
        ));
        let admission = Arc::new(AdmissionController::from_registry(
            &registry,
            config.admission.clone(),
        ));
        let router = Arc::new(EngineRouter::new(
            Arc::clone(&registry),
            Arc::clone(&health),
            config.routing.clone(),
        ));
        let gateway = Arc::new(Gateway::new(
            router,
            health,
            admission,
            client,
            Duration::from_secs(config.server.request_timeout_seconds),
        ));
        Ok(Self::new(config, registry, gateway))
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        self.gateway.health()
    }

    pub fn admission(&self) -> &Arc<AdmissionController> {
        self.gateway.admission()
    }

    pub fn router(&self) -> &Arc<EngineRouter> {
        self.gateway.router()
    }
}

/// Create the main API router with all endpoints configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/chat/stream", post(chat::handle))
        .route("/admin/engines", get(admin::list_engines))
        .route("/admin/engines/:name", patch(admin::update_engine))
        .route("/admin/engines/:name/health", get(admin::engine_health))
        .route(
            "/admin/engines/:name/health/reset",
            post(admin::reset_engine_health),
        )
        .route("/health", get(health::handle))
        .route("/metrics", get(crate::metrics::handler::metrics_handler))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
