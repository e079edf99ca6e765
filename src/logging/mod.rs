//! Structured logging helpers
//!
//! Filter directive construction for `tracing-subscriber` and trace id
//! generation for inbound chat requests.

pub mod middleware;

pub use middleware::generate_trace_id;

/// Target prefix of every log event emitted by this crate
pub const CRATE_TARGET: &str = "gateway";

/// Build filter directives string from LoggingConfig
///
/// Constructs a tracing filter string that includes the base log level
/// and any component-specific log levels configured in the LoggingConfig.
/// Components are emitted in name order so the result is stable.
///
/// # Examples
///
/// ```
/// use gateway::config::{LogFormat, LoggingConfig};
/// use gateway::logging::build_filter_directives;
/// use std::collections::HashMap;
///
/// let mut component_levels = HashMap::new();
/// component_levels.insert("health".to_string(), "debug".to_string());
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Pretty,
///     component_levels: Some(component_levels),
/// };
///
/// assert_eq!(build_filter_directives(&config), "info,gateway::health=debug");
/// ```
pub fn build_filter_directives(config: &crate::config::LoggingConfig) -> String {
    let mut filter_str = config.level.clone();

    if let Some(component_levels) = &config.component_levels {
        let mut components: Vec<_> = component_levels.iter().collect();
        components.sort();
        for (component, level) in components {
            filter_str.push_str(&format!(",{}::{}={}", CRATE_TARGET, component, level));
        }
    }

    filter_str
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggingConfig;
    use std::collections::HashMap;

    #[test]
    fn test_filter_base_level_only() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            ..Default::default()
        };
        assert_eq!(build_filter_directives(&config), "warn");
    }

    #[test]
    fn test_filter_components_sorted() {
        let mut levels = HashMap::new();
        levels.insert("routing".to_string(), "trace".to_string());
        levels.insert("admission".to_string(), "debug".to_string());
        let config = LoggingConfig {
            level: "info".to_string(),
            component_levels: Some(levels),
            ..Default::default()
        };

        assert_eq!(
            build_filter_directives(&config),
            "info,gateway::admission=debug,gateway::routing=trace"
        );
    }
}
