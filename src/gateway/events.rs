//! Outbound event protocol
//!
//! A stream is exactly one `meta`, zero or more `delta`, and exactly one
//! terminal `done` or `error`. The one exception is a request that fails
//! before an engine is admitted, which receives a single `error`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire-visible error taxonomy carried by `error` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorKind {
    EngineUnavailable,
    RateLimited,
    Timeout,
    StreamError,
}

impl GatewayErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GatewayErrorKind::EngineUnavailable => "engine_unavailable",
            GatewayErrorKind::RateLimited => "rate_limited",
            GatewayErrorKind::Timeout => "timeout",
            GatewayErrorKind::StreamError => "stream_error",
        }
    }

    /// Timeout if the upstream message mentions one, else a generic stream error.
    pub fn from_upstream_message(message: &str) -> Self {
        if message.to_lowercase().contains("timeout") {
            GatewayErrorKind::Timeout
        } else {
            GatewayErrorKind::StreamError
        }
    }
}

impl std::fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaEvent {
    pub trace_id: String,
    pub engine: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
}

/// One output fragment.
///
/// Tool-call arguments arrive in pieces; consumers concatenate them per
/// `index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeltaEvent {
    Text {
        text: String,
    },
    ToolCallDelta {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoneEvent {
    /// Last finish reason reported by the engine, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub kind: GatewayErrorKind,
    pub message: String,
}

/// Event sent to the caller
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    Meta(MetaEvent),
    Delta(DeltaEvent),
    Done(DoneEvent),
    Error(ErrorEvent),
}

impl GatewayEvent {
    pub fn text(text: impl Into<String>) -> Self {
        GatewayEvent::Delta(DeltaEvent::Text { text: text.into() })
    }

    pub fn error(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        GatewayEvent::Error(ErrorEvent {
            kind,
            message: message.into(),
        })
    }

    /// SSE event name
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayEvent::Meta(_) => "meta",
            GatewayEvent::Delta(_) => "delta",
            GatewayEvent::Done(_) => "done",
            GatewayEvent::Error(_) => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GatewayEvent::Done(_) | GatewayEvent::Error(_))
    }

    /// JSON payload of the event, without the kind.
    pub fn data(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            GatewayEvent::Meta(e) => serde_json::to_value(e),
            GatewayEvent::Delta(e) => serde_json::to_value(e),
            GatewayEvent::Done(e) => serde_json::to_value(e),
            GatewayEvent::Error(e) => serde_json::to_value(e),
        }
    }
}
