//! Routing configuration

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::error::ConfigError;

/// Routing configuration
///
/// Engines play one of two roles: the lightweight (CPU-bound) engine that
/// serves ordinary traffic, and the high-capability (GPU-batched) engine that
/// serves tool calls, structured output, long contexts and peak-hour load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub lightweight_engine: String,
    pub high_capability_engine: String,
    /// Order in which engines are tried when the preferred one is unusable.
    /// Empty means "every registered engine, in name order".
    pub fallback_order: Vec<String>,
    /// Route requests with tools or a response schema to the high-capability engine
    pub prefer_high_capability_for_tools: bool,
    /// Estimated prompt tokens above which the high-capability engine is used
    pub context_threshold_tokens: u32,
    pub peak_hours: PeakHoursConfig,
}

/// Local wall-clock window during which the high-capability engine is preferred.
///
/// The window is half-open (`start_hour <= hour < end_hour`) and may wrap
/// midnight when `start_hour > end_hour`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakHoursConfig {
    pub enabled: bool,
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            lightweight_engine: "fast-local".to_string(),
            high_capability_engine: "batched-gpu".to_string(),
            fallback_order: Vec::new(),
            prefer_high_capability_for_tools: true,
            context_threshold_tokens: 3000,
            peak_hours: PeakHoursConfig::default(),
        }
    }
}

impl Default for PeakHoursConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start_hour: 9,
            end_hour: 18,
        }
    }
}

/// Validate that every engine named by the routing section is configured.
pub fn validate_engine_references(
    routing: &RoutingConfig,
    engine_names: &HashSet<&str>,
) -> Result<(), ConfigError> {
    let roles = [
        ("routing.lightweight_engine", &routing.lightweight_engine),
        ("routing.high_capability_engine", &routing.high_capability_engine),
    ];
    for (field, name) in roles {
        if !engine_names.contains(name.as_str()) {
            return Err(ConfigError::UnknownEngine {
                field: field.to_string(),
                name: name.clone(),
            });
        }
    }

    for (i, name) in routing.fallback_order.iter().enumerate() {
        if !engine_names.contains(name.as_str()) {
            return Err(ConfigError::UnknownEngine {
                field: format!("routing.fallback_order[{}]", i),
                name: name.clone(),
            });
        }
    }

    let hours = &routing.peak_hours;
    if hours.start_hour > 23 || hours.end_hour > 23 {
        return Err(ConfigError::Validation {
            field: "routing.peak_hours".to_string(),
            message: "hours must be in 0..=23".to_string(),
        });
    }

    Ok(())
}
