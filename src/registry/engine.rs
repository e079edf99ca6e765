use crate::config::EngineConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Committed configuration of one engine.
///
/// Instances are immutable; every update produces a new snapshot that
/// replaces the previous one as a whole, so readers never observe a
/// partially applied change.
///
/// # Examples
///
/// ```
/// use gateway::registry::EngineSettings;
///
/// let settings = EngineSettings::new("fast-local", "http://localhost:8080", "qwen2.5-7b");
/// assert!(settings.enabled);
/// assert_eq!(settings.max_concurrent, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub name: String,
    /// Base URL for API requests
    pub url: String,
    /// Model identifier sent to the engine
    pub model: String,
    pub enabled: bool,
    pub supports_tools: bool,
    pub supports_structured_output: bool,
    pub max_concurrent: u32,
    pub chars_per_token: u32,
    /// When this snapshot was committed
    pub updated_at: DateTime<Utc>,
}

impl EngineSettings {
    /// Create enabled settings with default capabilities and limits.
    pub fn new(name: impl Into<String>, url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            model: model.into(),
            enabled: true,
            supports_tools: false,
            supports_structured_output: false,
            max_concurrent: 4,
            chars_per_token: 4,
            updated_at: Utc::now(),
        }
    }

    /// Chat completion endpoint for this engine.
    pub fn chat_url(&self) -> String {
        format!("{}/v1/chat/completions", self.url.trim_end_matches('/'))
    }

    /// Estimate the token count of `chars` characters for this engine.
    pub fn estimate_tokens(&self, chars: usize) -> u32 {
        let per_token = self.chars_per_token.max(1) as usize;
        (chars / per_token).min(u32::MAX as usize) as u32
    }
}

impl From<&EngineConfig> for EngineSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            name: config.name.clone(),
            url: config.url.clone(),
            model: config.model.clone(),
            enabled: config.enabled,
            supports_tools: config.supports_tools,
            supports_structured_output: config.supports_structured_output,
            max_concurrent: config.max_concurrent,
            chars_per_token: config.chars_per_token,
            updated_at: Utc::now(),
        }
    }
}

/// Partial update applied by the admin surface.
///
/// Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_tools: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_structured_output: Option<bool>,
}

impl EngineUpdate {
    /// Produce the next snapshot, or a message describing why the update is invalid.
    pub(crate) fn apply_to(&self, current: &EngineSettings) -> Result<EngineSettings, String> {
        if matches!(self.max_concurrent, Some(0)) {
            return Err("max_concurrent must be at least 1".to_string());
        }
        if self.url.as_deref().is_some_and(str::is_empty) {
            return Err("url cannot be empty".to_string());
        }
        if self.model.as_deref().is_some_and(str::is_empty) {
            return Err("model cannot be empty".to_string());
        }

        let mut next = current.clone();
        if let Some(enabled) = self.enabled {
            next.enabled = enabled;
        }
        if let Some(ref url) = self.url {
            next.url = url.clone();
        }
        if let Some(ref model) = self.model {
            next.model = model.clone();
        }
        if let Some(max) = self.max_concurrent {
            next.max_concurrent = max;
        }
        if let Some(tools) = self.supports_tools {
            next.supports_tools = tools;
        }
        if let Some(structured) = self.supports_structured_output {
            next.supports_structured_output = structured;
        }
        next.updated_at = Utc::now();
        Ok(next)
    }
}
