//! Admission control configuration

use serde::{Deserialize, Serialize};

/// Limits applied by the admission controller.
///
/// Per-engine capacity comes from each engine's `max_concurrent`; this
/// section holds the settings shared by all engines.
///
/// # Example
///
/// ```toml
/// [admission]
/// acquire_timeout_ms = 2000
/// max_concurrent_per_caller = 4
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// How long an acquire may wait for a free engine slot.
    pub acquire_timeout_ms: u64,

    /// In-flight requests allowed per caller id, across all engines.
    pub max_concurrent_per_caller: u32,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            acquire_timeout_ms: 2000,
            max_concurrent_per_caller: 4,
        }
    }
}
