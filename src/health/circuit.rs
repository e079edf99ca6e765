//! Sliding-window circuit breaker.
//!
//! The breaker is attached to an engine's health record but keeps its own
//! state. Reads are a single atomic load; outcome recording takes a short
//! mutex over the window that is never held across I/O.

use super::config::CircuitBreakerConfig;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum CircuitState {
    /// Requests flow normally
    Closed = 0,
    /// Engine is treated as unusable until the cooldown elapses
    Open = 1,
    /// Cooldown elapsed; the next outcome decides
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Open,
            2 => Self::HalfOpen,
            _ => Self::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CallOutcome {
    failed: bool,
    slow: bool,
}

/// Point-in-time view of a breaker, for the admin surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitMetrics {
    pub state: CircuitState,
    pub buffered_calls: u32,
    pub failed_calls: u32,
    pub slow_calls: u32,
    pub failure_rate: f64,
    pub slow_call_rate: f64,
}

/// Circuit breaker for a single engine.
pub struct CircuitBreaker {
    engine: String,
    config: CircuitBreakerConfig,
    state: AtomicU8,
    /// Milliseconds since `epoch` at which the circuit last opened
    opened_at_ms: AtomicU64,
    epoch: Instant,
    window: Mutex<VecDeque<CallOutcome>>,
}

impl CircuitBreaker {
    pub fn new(engine: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let capacity = config.window_size as usize;
        Self {
            engine: engine.into(),
            config,
            state: AtomicU8::new(CircuitState::Closed as u8),
            opened_at_ms: AtomicU64::new(0),
            epoch: Instant::now(),
            window: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Current state. An open circuit whose cooldown has elapsed moves to
    /// half-open here, with a compare-and-swap so only one reader logs it.
    pub fn state(&self) -> CircuitState {
        let current = CircuitState::from(self.state.load(Ordering::Acquire));
        if current != CircuitState::Open || !self.cooldown_elapsed() {
            return current;
        }

        match self.state.compare_exchange(
            CircuitState::Open as u8,
            CircuitState::HalfOpen as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                info!(engine = %self.engine, "Circuit breaker half-open, allowing trial call");
                CircuitState::HalfOpen
            }
            Err(actual) => CircuitState::from(actual),
        }
    }

    /// Whether the breaker currently blocks the engine.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Record the outcome of one call.
    pub fn record(&self, failed: bool, latency: Option<Duration>) {
        let slow = latency
            .map(|l| l.as_millis() >= self.config.slow_call_ms as u128)
            .unwrap_or(false);

        let mut window = self.window.lock();
        match self.state() {
            CircuitState::HalfOpen => {
                if failed || slow {
                    self.open(&mut window, "trial call failed");
                } else {
                    self.close(&mut window);
                }
            }
            CircuitState::Closed => {
                window.push_back(CallOutcome { failed, slow });
                while window.len() > self.config.window_size as usize {
                    window.pop_front();
                }
                if window.len() >= self.config.minimum_calls as usize {
                    let (failure_rate, slow_rate) = rates(&window);
                    if failure_rate >= self.config.failure_rate_threshold {
                        self.open(&mut window, "failure rate threshold reached");
                    } else if slow_rate >= self.config.slow_call_rate_threshold {
                        self.open(&mut window, "slow call rate threshold reached");
                    }
                }
            }
            // Outcomes of calls admitted before the circuit opened
            CircuitState::Open => {}
        }
    }

    /// Force the breaker closed and clear the window.
    pub fn reset(&self) {
        let mut window = self.window.lock();
        self.close(&mut window);
    }

    pub fn metrics(&self) -> CircuitMetrics {
        let state = self.state();
        let window = self.window.lock();
        let failed_calls = window.iter().filter(|o| o.failed).count() as u32;
        let slow_calls = window.iter().filter(|o| o.slow).count() as u32;
        let (failure_rate, slow_call_rate) = rates(&window);
        CircuitMetrics {
            state,
            buffered_calls: window.len() as u32,
            failed_calls,
            slow_calls,
            failure_rate,
            slow_call_rate,
        }
    }

    fn cooldown_elapsed(&self) -> bool {
        let opened_at = self.opened_at_ms.load(Ordering::Acquire);
        let now = self.epoch.elapsed().as_millis() as u64;
        now.saturating_sub(opened_at) >= self.config.open_cooldown_seconds * 1000
    }

    fn open(&self, window: &mut VecDeque<CallOutcome>, reason: &str) {
        let (failure_rate, slow_rate) = rates(window);
        self.opened_at_ms
            .store(self.epoch.elapsed().as_millis() as u64, Ordering::Release);
        self.state.store(CircuitState::Open as u8, Ordering::Release);
        window.clear();
        warn!(
            engine = %self.engine,
            reason,
            failure_rate,
            slow_rate,
            cooldown_seconds = self.config.open_cooldown_seconds,
            "Circuit breaker opened"
        );
    }

    fn close(&self, window: &mut VecDeque<CallOutcome>) {
        let previous = self.state.swap(CircuitState::Closed as u8, Ordering::AcqRel);
        window.clear();
        if previous != CircuitState::Closed as u8 {
            info!(engine = %self.engine, "Circuit breaker closed");
        }
    }
}

fn rates(window: &VecDeque<CallOutcome>) -> (f64, f64) {
    if window.is_empty() {
        return (0.0, 0.0);
    }
    let total = window.len() as f64;
    let failed = window.iter().filter(|o| o.failed).count() as f64;
    let slow = window.iter().filter(|o| o.slow).count() as f64;
    (failed / total, slow / total)
}
