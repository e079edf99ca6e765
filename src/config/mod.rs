//! Configuration module for the gateway
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`GATEWAY_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use gateway::config::GatewayConfig;
//!
//! let toml = r#"
//! [server]
//! port = 9000
//!
//! [[engines]]
//! name = "fast-local"
//! url = "http://localhost:8080"
//! model = "qwen2.5-7b-instruct"
//! "#;
//! let config: GatewayConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.server.port, 9000);
//! assert_eq!(config.engines[0].max_concurrent, 4);
//! ```

pub mod admission;
pub mod engine;
pub mod error;
pub mod logging;
pub mod routing;
pub mod server;

pub use admission::AdmissionConfig;
pub use engine::EngineConfig;
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use routing::{PeakHoursConfig, RoutingConfig};
pub use server::ServerConfig;

// Health and circuit breaker settings live next to the code that uses them
pub use crate::health::{CircuitBreakerConfig, HealthCheckConfig};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Unified configuration for the gateway server.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Active probe and health state machine settings
    pub health_check: HealthCheckConfig,
    /// Sliding-window circuit breaker settings (shared by all engines)
    pub circuit_breaker: CircuitBreakerConfig,
    /// Admission control limits
    pub admission: AdmissionConfig,
    /// Engine selection policy
    pub routing: RoutingConfig,
    /// Inference engine definitions
    pub engines: Vec<EngineConfig>,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supports GATEWAY_* environment variables for common settings.
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(port) = std::env::var("GATEWAY_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(host) = std::env::var("GATEWAY_HOST") {
            self.server.host = host;
        }
        if let Ok(timeout) = std::env::var("GATEWAY_REQUEST_TIMEOUT") {
            if let Ok(t) = timeout.parse() {
                self.server.request_timeout_seconds = t;
            }
        }

        if let Ok(level) = std::env::var("GATEWAY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("GATEWAY_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Ok(health) = std::env::var("GATEWAY_HEALTH_CHECK") {
            self.health_check.enabled = health.to_lowercase() == "true";
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation {
                field: "server.port".to_string(),
                message: "port must be non-zero".to_string(),
            });
        }

        let durations = [
            ("server.request_timeout_seconds", self.server.request_timeout_seconds),
            ("health_check.interval_seconds", self.health_check.interval_seconds),
            ("health_check.timeout_seconds", self.health_check.timeout_seconds),
        ];
        for (field, seconds) in durations {
            if seconds == 0 {
                return Err(ConfigError::Validation {
                    field: field.to_string(),
                    message: "must be at least 1 second".to_string(),
                });
            }
        }

        let mut names = HashSet::new();
        for (i, engine) in self.engines.iter().enumerate() {
            if engine.name.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("engines[{}].name", i),
                    message: "name cannot be empty".to_string(),
                });
            }
            if engine.url.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("engines[{}].url", i),
                    message: "URL cannot be empty".to_string(),
                });
            }
            if engine.model.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("engines[{}].model", i),
                    message: "model cannot be empty".to_string(),
                });
            }
            if engine.max_concurrent == 0 {
                return Err(ConfigError::Validation {
                    field: format!("engines[{}].max_concurrent", i),
                    message: "must be at least 1".to_string(),
                });
            }
            if engine.chars_per_token == 0 {
                return Err(ConfigError::Validation {
                    field: format!("engines[{}].chars_per_token", i),
                    message: "must be at least 1".to_string(),
                });
            }
            if !names.insert(engine.name.as_str()) {
                return Err(ConfigError::Validation {
                    field: format!("engines[{}].name", i),
                    message: format!("duplicate engine name '{}'", engine.name),
                });
            }
        }

        if !self.engines.is_empty() {
            routing::validate_engine_references(&self.routing, &names)?;
        }

        if self.admission.max_concurrent_per_caller == 0 {
            return Err(ConfigError::Validation {
                field: "admission.max_concurrent_per_caller".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let breaker = &self.circuit_breaker;
        let rates = [
            ("circuit_breaker.failure_rate_threshold", breaker.failure_rate_threshold),
            ("circuit_breaker.slow_call_rate_threshold", breaker.slow_call_rate_threshold),
        ];
        for (field, rate) in rates {
            if !(rate > 0.0 && rate <= 1.0) {
                return Err(ConfigError::Validation {
                    field: field.to_string(),
                    message: format!("rate must be in (0, 1], got {}", rate),
                });
            }
        }
        if breaker.window_size == 0 || breaker.minimum_calls > breaker.window_size {
            return Err(ConfigError::Validation {
                field: "circuit_breaker.minimum_calls".to_string(),
                message: "window_size must be non-zero and at least minimum_calls".to_string(),
            });
        }

        Ok(())
    }
}
