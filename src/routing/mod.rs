//! Engine selection
//!
//! The router picks one engine per request from the request's shape and the
//! live health signal. Rules are evaluated in order and the first match wins;
//! a preferred engine that is not usable falls back along the configured
//! fallback order.

use std::sync::Arc;

pub mod error;
pub mod policy;
pub mod requirements;

pub use error::RoutingError;
pub use policy::{FixedPeakHours, PeakHoursPolicy, WallClockPeakHours};
pub use requirements::{EnginePreference, RequestProfile};

use crate::config::RoutingConfig;
use crate::health::HealthMonitor;
use crate::registry::{EngineRegistry, EngineSettings};

/// Why an engine was chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionReason {
    /// Caller named the engine
    Explicit,
    /// Request carries tools or a response schema
    Capabilities,
    /// Estimated context exceeds the threshold
    LongContext,
    PeakHours,
    /// Default lightweight route
    Lightweight,
    /// A/B primary named by the caller
    AbPrimary,
    /// Preferred engine was unusable
    Fallback { preferred: String },
}

impl std::fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionReason::Explicit => write!(f, "explicit"),
            SelectionReason::Capabilities => write!(f, "capabilities"),
            SelectionReason::LongContext => write!(f, "long_context"),
            SelectionReason::PeakHours => write!(f, "peak_hours"),
            SelectionReason::Lightweight => write!(f, "lightweight"),
            SelectionReason::AbPrimary => write!(f, "ab_primary"),
            SelectionReason::Fallback { preferred } => write!(f, "fallback_from:{}", preferred),
        }
    }
}

/// Outcome of a successful selection
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    /// Settings snapshot taken at selection time
    pub engine: Arc<EngineSettings>,
    pub reason: SelectionReason,
}

impl RoutingDecision {
    pub fn engine_name(&self) -> &str {
        &self.engine.name
    }
}

/// Router selects an engine for each request
pub struct EngineRouter {
    registry: Arc<EngineRegistry>,
    health: Arc<HealthMonitor>,
    config: RoutingConfig,
    peak_hours: Arc<dyn PeakHoursPolicy>,
}

impl EngineRouter {
    /// Create a router using server-local wall-clock peak hours.
    pub fn new(
        registry: Arc<EngineRegistry>,
        health: Arc<HealthMonitor>,
        config: RoutingConfig,
    ) -> Self {
        let peak_hours = Arc::new(WallClockPeakHours::new(config.peak_hours.clone()));
        Self {
            registry,
            health,
            config,
            peak_hours,
        }
    }

    /// Replace the peak-hours policy
    pub fn with_peak_hours_policy(mut self, policy: Arc<dyn PeakHoursPolicy>) -> Self {
        self.peak_hours = policy;
        self
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Enabled, not UNHEALTHY, and circuit not open.
    pub fn is_usable(&self, engine: &str) -> bool {
        self.health.is_available(engine)
    }

    /// Names of all currently usable engines, in fallback order.
    pub fn usable_engines(&self) -> Vec<String> {
        self.candidates()
            .into_iter()
            .filter(|name| self.is_usable(name))
            .collect()
    }

    /// Select an engine for a request.
    pub fn select_engine(&self, profile: &RequestProfile) -> Result<RoutingDecision, RoutingError> {
        let decision = match &profile.preference {
            EnginePreference::Explicit(name) => {
                self.validate_or_fallback(name, SelectionReason::Explicit)
            }
            EnginePreference::Ab => self.validate_or_fallback(
                &self.config.lightweight_engine,
                SelectionReason::AbPrimary,
            ),
            EnginePreference::Auto => self.select_auto(profile),
        }?;
        Ok(selected(decision))
    }

    /// Resolve the primary engine of an A/B comparison.
    ///
    /// Used by experiment dispatch, which duplicates the request and needs the
    /// primary validated with the same fallback rules as an explicit request.
    pub fn select_primary(&self, primary: &str) -> Result<RoutingDecision, RoutingError> {
        self.validate_or_fallback(primary, SelectionReason::AbPrimary)
            .map(selected)
    }

    fn select_auto(&self, profile: &RequestProfile) -> Result<RoutingDecision, RoutingError> {
        let high = &self.config.high_capability_engine;
        let light = &self.config.lightweight_engine;

        if self.config.prefer_high_capability_for_tools
            && (profile.needs_tools || profile.needs_structured_output)
        {
            return self.validate_or_fallback(high, SelectionReason::Capabilities);
        }

        if self.estimate_tokens(profile.content_chars) > self.config.context_threshold_tokens {
            return self.validate_or_fallback(high, SelectionReason::LongContext);
        }

        if self.peak_hours.is_peak() {
            if let Some(engine) = self.usable_settings(high) {
                return Ok(RoutingDecision {
                    engine,
                    reason: SelectionReason::PeakHours,
                });
            }
        }

        self.validate_or_fallback(light, SelectionReason::Lightweight)
    }

    /// Token estimate using the lightweight engine's heuristic, since the
    /// threshold guards what that engine can serve.
    fn estimate_tokens(&self, chars: usize) -> u32 {
        match self.registry.get(&self.config.lightweight_engine) {
            Some(engine) => engine.estimate_tokens(chars),
            None => (chars / 4).min(u32::MAX as usize) as u32,
        }
    }

    fn usable_settings(&self, name: &str) -> Option<Arc<EngineSettings>> {
        if !self.is_usable(name) {
            return None;
        }
        self.registry.get(name)
    }

    fn validate_or_fallback(
        &self,
        preferred: &str,
        reason: SelectionReason,
    ) -> Result<RoutingDecision, RoutingError> {
        if let Some(engine) = self.usable_settings(preferred) {
            return Ok(RoutingDecision { engine, reason });
        }

        let candidates = self.candidates();
        for name in candidates.iter().filter(|n| n.as_str() != preferred) {
            if let Some(engine) = self.usable_settings(name) {
                tracing::info!(
                    preferred,
                    fallback = %engine.name,
                    "Preferred engine unusable, falling back"
                );
                return Ok(RoutingDecision {
                    engine,
                    reason: SelectionReason::Fallback {
                        preferred: preferred.to_string(),
                    },
                });
            }
        }

        let mut tried = vec![preferred.to_string()];
        tried.extend(candidates.into_iter().filter(|n| n != preferred));
        tracing::warn!(preferred, ?tried, "No usable engine");
        Err(RoutingError::EngineUnavailable {
            preferred: preferred.to_string(),
            tried,
        })
    }

    /// Configured fallback order, or every registered engine by name.
    fn candidates(&self) -> Vec<String> {
        if self.config.fallback_order.is_empty() {
            self.registry.names()
        } else {
            self.config.fallback_order.clone()
        }
    }
}

fn selected(decision: RoutingDecision) -> RoutingDecision {
    metrics::counter!(crate::metrics::ENGINE_SELECTIONS_TOTAL,
        "engine" => decision.engine.name.clone()
    )
    .increment(1);
    tracing::debug!(
        engine = %decision.engine.name,
        reason = %decision.reason,
        "Engine selected"
    );
    decision
}
