//! Outbound streaming calls to engines

use crate::registry::EngineSettings;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Errors from a backend streaming call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend transport error: {0}")]
    Transport(String),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend timeout after {0}s")]
    Timeout(u64),
}

impl BackendError {
    fn from_reqwest(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            BackendError::Timeout(timeout.as_secs())
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

/// Chat message passed through to the engine unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    /// Null for assistant messages that only carry tool calls
    #[serde(default)]
    pub content: Option<String>,
    /// Tool call ids, names and other role-specific fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            extra: serde_json::Map::new(),
        }
    }

    pub fn content_chars(&self) -> usize {
        self.content.as_deref().map_or(0, |c| c.chars().count())
    }
}

/// Request body sent to an engine's chat completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
}

/// Raw bytes of a backend stream
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BackendError>> + Send>>;

/// Opens a streaming chat call against one engine.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Returns once response headers arrive; the body is streamed.
    async fn stream_chat(
        &self,
        engine: &EngineSettings,
        request: &BackendChatRequest,
    ) -> Result<ByteStream, BackendError>;
}

/// reqwest-backed engine client
#[derive(Clone)]
pub struct HttpEngineClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpEngineClient {
    /// `timeout` bounds the whole exchange, body included.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(32)
            .build()
            .unwrap_or_default();
        Self { client, timeout }
    }

    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl EngineClient for HttpEngineClient {
    async fn stream_chat(
        &self,
        engine: &EngineSettings,
        request: &BackendChatRequest,
    ) -> Result<ByteStream, BackendError> {
        let timeout = self.timeout;
        let response = self
            .client
            .post(engine.chat_url())
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(e, timeout))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }

        let stream = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| BackendError::from_reqwest(e, timeout)));
        Ok(Box::pin(stream))
    }
}
