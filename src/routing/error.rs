//! Error types for routing failures

use thiserror::Error;

/// Errors that can occur during engine selection
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoutingError {
    /// Neither the preferred engine nor any fallback is usable
    #[error("No usable engine available (preferred '{preferred}', tried {tried:?})")]
    EngineUnavailable {
        preferred: String,
        tried: Vec<String>,
    },
}
