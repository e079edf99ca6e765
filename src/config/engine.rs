//! Engine configuration

use serde::{Deserialize, Serialize};

/// Static definition of one inference engine, as written in `[[engines]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine identity (e.g. "fast-local", "batched-gpu")
    pub name: String,
    /// Base URL of the engine's OpenAI-compatible API
    pub url: String,
    /// Model identifier sent with every request to this engine
    pub model: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub supports_tools: bool,
    #[serde(default)]
    pub supports_structured_output: bool,
    /// Maximum in-flight requests admitted to this engine
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,
    /// Characters per token used to estimate context length for this engine
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: u32,
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent() -> u32 {
    4
}

fn default_chars_per_token() -> u32 {
    4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults_from_minimal_toml() {
        let toml = r#"
        name = "fast-local"
        url = "http://localhost:8080"
        model = "qwen2.5-7b-instruct-q4"
        "#;
        let config: EngineConfig = toml::from_str(toml).unwrap();
        assert!(config.enabled);
        assert!(!config.supports_tools);
        assert!(!config.supports_structured_output);
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.chars_per_token, 4);
    }
}
