/// Error handling for the API server
///
/// Handlers return `Result<T, ApiError>`; the error converts into a JSON body
/// with a matching HTTP status code.
///
/// ```json
/// { "error": "not_found", "message": "Unknown service \"billing-api\"" }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use userapi_shared::runtime::RuntimeError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Not found (404)
    NotFound(String),

    /// Internal server error (500)
    InternalError(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "not_found")
    pub error: String,

    /// Human-readable error message
    pub message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::InternalError(msg) => {
                // Logged here, never sent to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Convert runtime lookups and provisioning failures to API errors
impl From<RuntimeError> for ApiError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::UnknownService(_)
            | RuntimeError::UnknownDatabase(_)
            | RuntimeError::NotDeclared { .. } => ApiError::NotFound(err.to_string()),
            RuntimeError::Connect { .. } => ApiError::ServiceUnavailable(err.to_string()),
            RuntimeError::UnresolvedUrl(_) | RuntimeError::Migrate { .. } => {
                ApiError::InternalError(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ApiError::NotFound("Unknown service".to_string());
        assert_eq!(err.to_string(), "Not found: Unknown service");

        let err = ApiError::ServiceUnavailable("database down".to_string());
        assert_eq!(err.to_string(), "Service unavailable: database down");
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            ApiError::NotFound("x".to_string()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::InternalError("x".to_string()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::ServiceUnavailable("x".to_string()).into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_runtime_error_mapping() {
        let err: ApiError = RuntimeError::UnknownService("billing-api".to_string()).into();
        assert!(matches!(err, ApiError::NotFound(ref msg) if msg.contains("billing-api")));

        let err: ApiError = RuntimeError::UnresolvedUrl("users".to_string()).into();
        assert!(matches!(err, ApiError::InternalError(_)));
    }
}
