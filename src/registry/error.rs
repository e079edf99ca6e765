/// Errors that can occur during registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("engine already exists: {0}")]
    DuplicateEngine(String),

    #[error("engine not found: {0}")]
    EngineNotFound(String),

    #[error("invalid update for engine '{name}': {message}")]
    InvalidUpdate { name: String, message: String },
}
