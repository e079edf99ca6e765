//! Engine health monitoring.
//!
//! Each engine has one health record for the lifetime of the process. The
//! record is an immutable [`EngineHealth`] snapshot published through an
//! [`ArcSwap`], plus a [`CircuitBreaker`] that is attached to it but keeps
//! its own state. Two input paths feed the record: the periodic active probe
//! started by [`HealthMonitor::start`], and passive outcomes reported by the
//! gateway for real traffic. Both go through [`HealthMonitor::record_success`]
//! and [`HealthMonitor::record_failure`].

mod circuit;
mod config;
mod error;
mod state;


pub use circuit::{CircuitBreaker, CircuitMetrics, CircuitState};
pub use config::*;
pub use error::*;
pub use state::*;

use crate::registry::{EngineRegistry, EngineSettings};
use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Health record for one engine.
struct HealthCell {
    health: ArcSwap<EngineHealth>,
    circuit: CircuitBreaker,
}

/// Result of probing one engine.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub engine: String,
    pub result: Result<Duration, ProbeError>,
    /// Status after the outcome was recorded
    pub status: HealthStatus,
}

/// Owns the health record of every engine and the active probe loop.
pub struct HealthMonitor {
    registry: Arc<EngineRegistry>,
    client: reqwest::Client,
    config: HealthCheckConfig,
    breaker_config: CircuitBreakerConfig,
    records: DashMap<String, Arc<HealthCell>>,
}

impl HealthMonitor {
    /// Create a monitor with one UNKNOWN record per registered engine.
    pub fn new(
        registry: Arc<EngineRegistry>,
        config: HealthCheckConfig,
        breaker_config: CircuitBreakerConfig,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();
        Self::with_client(registry, config, breaker_config, client)
    }

    /// Create a monitor with a custom HTTP client (for testing).
    pub fn with_client(
        registry: Arc<EngineRegistry>,
        config: HealthCheckConfig,
        breaker_config: CircuitBreakerConfig,
        client: reqwest::Client,
    ) -> Self {
        let monitor = Self {
            registry,
            client,
            config,
            breaker_config,
            records: DashMap::new(),
        };
        for name in monitor.registry.names() {
            monitor.cell(&name);
        }
        monitor
    }

    pub fn config(&self) -> &HealthCheckConfig {
        &self.config
    }

    fn cell(&self, engine: &str) -> Arc<HealthCell> {
        if let Some(cell) = self.records.get(engine) {
            return Arc::clone(cell.value());
        }
        self.records
            .entry(engine.to_string())
            .or_insert_with(|| {
                Arc::new(HealthCell {
                    health: ArcSwap::from_pointee(EngineHealth::default()),
                    circuit: CircuitBreaker::new(engine, self.breaker_config.clone()),
                })
            })
            .value()
            .clone()
    }

    /// Publish the next snapshot. Returns the replaced and the stored
    /// snapshot of the same swap.
    fn apply<F>(cell: &HealthCell, next: F) -> (Arc<EngineHealth>, Arc<EngineHealth>)
    where
        F: Fn(&EngineHealth) -> EngineHealth,
    {
        let mut stored = None;
        let previous = cell.health.rcu(|current| {
            let candidate = Arc::new(next(&**current));
            stored = Some(Arc::clone(&candidate));
            candidate
        });
        let stored = stored.unwrap_or_else(|| cell.health.load_full());
        (previous, stored)
    }

    /// Record a successful observation (probe response or first streamed chunk).
    pub fn record_success(&self, engine: &str, latency: Duration) {
        let cell = self.cell(engine);
        let (previous, current) =
            Self::apply(&cell, |health| health.after_success(latency, &self.config));
        cell.circuit.record(false, Some(latency));

        if previous.status != current.status {
            tracing::info!(
                engine,
                old_status = %previous.status,
                new_status = %current.status,
                latency_ms = latency.as_millis() as u64,
                "Engine status changed"
            );
        }
    }

    /// Record a failed observation (probe failure or stream error).
    pub fn record_failure(&self, engine: &str, error: &str) {
        let cell = self.cell(engine);
        let (previous, current) =
            Self::apply(&cell, |health| health.after_failure(error, &self.config));
        cell.circuit.record(true, None);

        if previous.status != current.status {
            tracing::warn!(
                engine,
                old_status = %previous.status,
                new_status = %current.status,
                consecutive_failures = current.consecutive_failures,
                error,
                "Engine status changed"
            );
        }
    }

    /// Current health snapshot for an engine.
    pub fn snapshot(&self, engine: &str) -> Arc<EngineHealth> {
        match self.records.get(engine) {
            Some(cell) => cell.health.load_full(),
            None => Arc::new(EngineHealth::default()),
        }
    }

    pub fn status(&self, engine: &str) -> HealthStatus {
        match self.records.get(engine) {
            Some(cell) => cell.health.load().status,
            None => HealthStatus::Unknown,
        }
    }

    pub fn circuit_state(&self, engine: &str) -> CircuitState {
        match self.records.get(engine) {
            Some(cell) => cell.circuit.state(),
            None => CircuitState::Closed,
        }
    }

    pub fn circuit_metrics(&self, engine: &str) -> CircuitMetrics {
        self.cell(engine).circuit.metrics()
    }

    /// UNKNOWN, HEALTHY and DEGRADED count as healthy unless the circuit is open.
    pub fn is_healthy(&self, engine: &str) -> bool {
        match self.records.get(engine) {
            Some(cell) => cell.health.load().status.is_routable() && !cell.circuit.is_open(),
            None => true,
        }
    }

    /// Enabled in the registry and healthy.
    pub fn is_available(&self, engine: &str) -> bool {
        self.registry.is_enabled(engine) && self.is_healthy(engine)
    }

    /// Force an engine back to UNKNOWN with zeroed counters and a closed circuit.
    pub fn reset(&self, engine: &str) {
        let cell = self.cell(engine);
        cell.health.store(Arc::new(EngineHealth::default()));
        cell.circuit.reset();
        tracing::info!(engine, "Engine health reset");
    }

    /// Probe one engine's liveness endpoint without recording the outcome.
    pub async fn probe_engine(&self, engine: &EngineSettings) -> Result<Duration, ProbeError> {
        let url = format!("{}{}", engine.url.trim_end_matches('/'), self.config.path);
        let start = Instant::now();

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .send()
            .await
            .map_err(|e| ProbeError::from_reqwest(e, self.config.timeout_seconds))?;

        let latency = start.elapsed();
        metrics::histogram!(crate::metrics::PROBE_LATENCY_SECONDS,
            "engine" => engine.name.clone()
        )
        .record(latency.as_secs_f64());

        if !response.status().is_success() {
            return Err(ProbeError::HttpError(response.status().as_u16()));
        }
        Ok(latency)
    }

    /// Probe every enabled engine concurrently and record the outcomes.
    pub async fn probe_all(&self) -> Vec<ProbeOutcome> {
        let engines: Vec<_> = self
            .registry
            .all()
            .into_iter()
            .filter(|e| e.enabled)
            .collect();

        let results =
            futures::future::join_all(engines.iter().map(|e| self.probe_engine(e))).await;

        engines
            .iter()
            .zip(results)
            .map(|(engine, result)| {
                match &result {
                    Ok(latency) => self.record_success(&engine.name, *latency),
                    Err(e) => self.record_failure(&engine.name, &e.to_string()),
                }
                ProbeOutcome {
                    engine: engine.name.clone(),
                    result,
                    status: self.status(&engine.name),
                }
            })
            .collect()
    }

    /// Start the probe loop. The task ends when the token is cancelled.
    pub fn start(self: Arc<Self>, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = Duration::from_secs(self.config.interval_seconds.max(1));
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(
                interval_seconds = self.config.interval_seconds,
                "Health monitor started"
            );

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Health monitor shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let outcomes = self.probe_all().await;
                        tracing::debug!(
                            engines_probed = outcomes.len(),
                            "Probe round completed"
                        );
                    }
                }
            }
        })
    }
}
