//! Request shape as seen by the router

use serde::{Deserialize, Serialize};

/// Engine choice made by the caller.
///
/// On the wire this is a plain string: `"auto"` (or absent), `"ab"` for an
/// A/B comparison, or an engine name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EnginePreference {
    #[default]
    Auto,
    Ab,
    Explicit(String),
}

impl From<String> for EnginePreference {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "" | "auto" => EnginePreference::Auto,
            "ab" => EnginePreference::Ab,
            _ => EnginePreference::Explicit(value.trim().to_string()),
        }
    }
}

impl From<&str> for EnginePreference {
    fn from(value: &str) -> Self {
        EnginePreference::from(value.to_string())
    }
}

impl From<EnginePreference> for String {
    fn from(value: EnginePreference) -> Self {
        match value {
            EnginePreference::Auto => "auto".to_string(),
            EnginePreference::Ab => "ab".to_string(),
            EnginePreference::Explicit(name) => name,
        }
    }
}

/// What the router needs to know about a request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestProfile {
    pub preference: EnginePreference,
    /// Request carries tool definitions
    pub needs_tools: bool,
    /// Request carries a structured-output schema
    pub needs_structured_output: bool,
    /// Sum of message content lengths, in characters
    pub content_chars: usize,
}

impl RequestProfile {
    pub fn auto(content_chars: usize) -> Self {
        Self {
            content_chars,
            ..Default::default()
        }
    }

    pub fn explicit(engine: impl Into<String>) -> Self {
        Self {
            preference: EnginePreference::Explicit(engine.into()),
            ..Default::default()
        }
    }

    pub fn with_tools(mut self) -> Self {
        self.needs_tools = true;
        self
    }

    pub fn with_structured_output(mut self) -> Self {
        self.needs_structured_output = true;
        self
    }
}
