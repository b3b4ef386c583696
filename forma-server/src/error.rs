//! HTTP error mapping for forma-server

use crate::validation::ErrorMap;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Answers rejected by the validator (400, per-field messages)
    #[error("Validation failed for {} field(s)", .0.len())]
    Validation(ErrorMap),

    /// Backing store unreachable or locked (503, retryable)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<forma_common::Error> for ApiError {
    fn from(err: forma_common::Error) -> Self {
        use forma_common::Error;

        if err.is_transient() {
            return ApiError::Unavailable(err.to_string());
        }
        match err {
            Error::NotFound(what) => ApiError::NotFound(what),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Validation(errors) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "errors": errors })),
                )
                    .into_response();
            }
            ApiError::Unavailable(msg) => {
                warn!("Store unavailable: {}", msg);
                let body = Json(json!({
                    "error": {
                        "code": "STORE_UNAVAILABLE",
                        "message": msg,
                        "retryable": true,
                    }
                }));
                return (StatusCode::SERVICE_UNAVAILABLE, body).into_response();
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
