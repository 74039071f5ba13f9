//! Application Error Types
//!
//! Centralized error handling with Axum integration.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        fields: Vec<FieldError>,
    },
}

impl AppError {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) | AppError::Database(_) | AppError::Redis(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

/// Field-level validation error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message, errors) = match self {
            AppError::NotFound(msg) => (10001, msg, None),
            AppError::BadRequest(msg) => (10002, msg, None),
            AppError::Unauthorized(msg) => (10003, msg, None),
            AppError::Conflict(msg) => (10005, msg, None),
            AppError::Validation { message, fields } => {
                (10007, message, Some(fields).filter(|f| !f.is_empty()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (10000, "Internal server error".into(), None)
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (10000, "Internal server error".into(), None)
            }
            AppError::Redis(e) => {
                tracing::error!("Redis error: {}", e);
                (10000, "Internal server error".into(), None)
            }
        };

        let body = ErrorResponse {
            code,
            message,
            errors,
        };

        (status, Json(body)).into_response()
    }
}
