//! Per-engine health record and status state machine.

use super::config::HealthCheckConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    /// No observation yet
    Unknown,
    /// Responding within the latency threshold
    Healthy,
    /// Responding slowly, or failing below the unhealthy threshold
    Degraded,
    /// Failure threshold reached
    Unhealthy,
}

impl HealthStatus {
    /// Next status after a successful observation with the given latency.
    pub fn on_success(self, latency_ms: u64, config: &HealthCheckConfig) -> HealthStatus {
        match self {
            HealthStatus::Unknown => HealthStatus::Healthy,
            HealthStatus::Healthy | HealthStatus::Degraded | HealthStatus::Unhealthy => {
                if latency_ms > config.degraded_latency_ms {
                    HealthStatus::Degraded
                } else {
                    HealthStatus::Healthy
                }
            }
        }
    }

    /// Next status after a failure, given the consecutive-failure count
    /// including this failure.
    pub fn on_failure(self, consecutive_failures: u32, config: &HealthCheckConfig) -> HealthStatus {
        if consecutive_failures >= config.failure_threshold {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Degraded
        }
    }

    /// Whether routing may use an engine in this status.
    pub fn is_routable(self) -> bool {
        !matches!(self, HealthStatus::Unhealthy)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Unknown => "UNKNOWN",
            HealthStatus::Healthy => "HEALTHY",
            HealthStatus::Degraded => "DEGRADED",
            HealthStatus::Unhealthy => "UNHEALTHY",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable health snapshot for a single engine.
///
/// Updates never mutate a snapshot in place; [`EngineHealth::after_success`]
/// and [`EngineHealth::after_failure`] return the next snapshot, which the
/// monitor publishes atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineHealth {
    pub status: HealthStatus,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub total_requests: u64,
    pub failed_requests: u64,
    pub total_latency_ms: u64,
    pub last_latency_ms: Option<u64>,
}

impl Default for EngineHealth {
    fn default() -> Self {
        Self {
            status: HealthStatus::Unknown,
            consecutive_successes: 0,
            consecutive_failures: 0,
            last_success_at: None,
            last_failure_at: None,
            last_error: None,
            total_requests: 0,
            failed_requests: 0,
            total_latency_ms: 0,
            last_latency_ms: None,
        }
    }
}

impl EngineHealth {
    /// Snapshot after a successful probe or first streamed byte.
    pub fn after_success(&self, latency: Duration, config: &HealthCheckConfig) -> Self {
        let latency_ms = latency.as_millis().min(u64::MAX as u128) as u64;
        Self {
            status: self.status.on_success(latency_ms, config),
            consecutive_successes: self.consecutive_successes.saturating_add(1),
            consecutive_failures: 0,
            last_success_at: Some(Utc::now()),
            last_failure_at: self.last_failure_at,
            last_error: self.last_error.clone(),
            total_requests: self.total_requests.saturating_add(1),
            failed_requests: self.failed_requests,
            total_latency_ms: self.total_latency_ms.saturating_add(latency_ms),
            last_latency_ms: Some(latency_ms),
        }
    }

    /// Snapshot after a failed probe or stream.
    pub fn after_failure(&self, error: &str, config: &HealthCheckConfig) -> Self {
        let consecutive_failures = self.consecutive_failures.saturating_add(1);
        Self {
            status: self.status.on_failure(consecutive_failures, config),
            consecutive_successes: 0,
            consecutive_failures,
            last_success_at: self.last_success_at,
            last_failure_at: Some(Utc::now()),
            last_error: Some(error.to_string()),
            total_requests: self.total_requests.saturating_add(1),
            failed_requests: self.failed_requests.saturating_add(1),
            total_latency_ms: self.total_latency_ms,
            last_latency_ms: self.last_latency_ms,
        }
    }

    /// Mean latency over all successful observations.
    pub fn avg_latency_ms(&self) -> Option<u64> {
        let successes = self.total_requests - self.failed_requests;
        (successes > 0).then(|| self.total_latency_ms / successes)
    }

    /// Fraction of observations that failed.
    pub fn error_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.failed_requests as f64 / self.total_requests as f64
        }
    }
}
