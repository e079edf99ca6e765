//! Error types for active health probes.

use thiserror::Error;

/// Errors that can occur while probing an engine.
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    /// Request timeout
    #[error("probe timeout after {0}s")]
    Timeout(u64),

    /// Connection failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Non-2xx response
    #[error("HTTP error: {0}")]
    HttpError(u16),
}

impl ProbeError {
    /// Classify a reqwest error.
    pub fn from_reqwest(e: reqwest::Error, timeout_seconds: u64) -> Self {
        if e.is_timeout() {
            ProbeError::Timeout(timeout_seconds)
        } else {
            ProbeError::ConnectionFailed(e.to_string())
        }
    }
}
