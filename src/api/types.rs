//! API error envelope shared by the non-streaming endpoints.

use crate::registry::RegistryError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error response envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    pub error: ApiErrorBody,
}

/// Error details.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiErrorBody {
    pub message: String,
    pub r#type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ApiError {
    fn new(message: impl Into<String>, r#type: &str, code: &str) -> Self {
        Self {
            error: ApiErrorBody {
                message: message.into(),
                r#type: r#type.to_string(),
                code: Some(code.to_string()),
            },
        }
    }

    /// Create a bad request error (400).
    pub fn bad_request(message: &str) -> Self {
        Self::new(message, "invalid_request_error", "invalid_request_error")
    }

    /// Create an engine not found error (404).
    pub fn engine_not_found(name: &str) -> Self {
        Self::new(
            format!("engine not found: {}", name),
            "invalid_request_error",
            "engine_not_found",
        )
    }

    /// Create an internal error (500).
    pub fn internal(message: &str) -> Self {
        Self::new(message, "server_error", "internal_error")
    }

    /// Get the HTTP status code for this error.
    fn status_code(&self) -> StatusCode {
        match self.error.code.as_deref() {
            Some("invalid_request_error") => StatusCode::BAD_REQUEST,
            Some("engine_not_found") => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::EngineNotFound(name) => ApiError::engine_not_found(&name),
            RegistryError::InvalidUpdate { .. } => ApiError::bad_request(&e.to_string()),
            RegistryError::DuplicateEngine(_) => ApiError::internal(&e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_engine_not_found_envelope() {
        let err = ApiError::engine_not_found("gguf");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({
                "error": {
                    "message": "engine not found: gguf",
                    "type": "invalid_request_error",
                    "code": "engine_not_found"
                }
            })
        );
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_registry_error_mapping() {
        let not_found: ApiError = RegistryError::EngineNotFound("x".to_string()).into();
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let invalid: ApiError = RegistryError::InvalidUpdate {
            name: "x".to_string(),
            message: "max_concurrent must be at least 1".to_string(),
        }
        .into();
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert!(invalid.error.message.contains("max_concurrent"));
    }

    #[test]
    fn test_internal_error_status() {
        let err = ApiError::internal("boom");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error.r#type, "server_error");
    }

    #[tokio::test]
    async fn test_into_response_status() {
        let response = ApiError::bad_request("messages cannot be empty").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
