//! Configuration for health tracking.

use serde::{Deserialize, Serialize};

/// Configuration for the health state machine and the active probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Whether the active probe runs
    pub enabled: bool,
    /// Seconds between probe rounds
    pub interval_seconds: u64,
    /// Timeout for each probe request
    pub timeout_seconds: u64,
    /// Consecutive failures before marking unhealthy
    pub failure_threshold: u32,
    /// Successes slower than this mark the engine degraded
    pub degraded_latency_ms: u64,
    /// Liveness path appended to each engine's base URL
    pub path: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 15,
            timeout_seconds: 3,
            failure_threshold: 3,
            degraded_latency_ms: 5000,
            path: "/health".to_string(),
        }
    }
}

/// Sliding-window circuit breaker parameters.
///
/// The window holds the last `window_size` call outcomes. Once at least
/// `minimum_calls` outcomes are buffered, the breaker opens when either the
/// failure rate or the slow-call rate reaches its threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub window_size: u32,
    pub minimum_calls: u32,
    /// Fraction of failed calls (0, 1] that opens the circuit
    pub failure_rate_threshold: f64,
    /// Fraction of slow calls (0, 1] that opens the circuit
    pub slow_call_rate_threshold: f64,
    /// Calls slower than this count as slow
    pub slow_call_ms: u64,
    /// Time spent open before a trial call is allowed
    pub open_cooldown_seconds: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window_size: 20,
            minimum_calls: 10,
            failure_rate_threshold: 0.5,
            slow_call_rate_threshold: 0.8,
            slow_call_ms: 10_000,
            open_cooldown_seconds: 30,
        }
    }
}
