//! Error handling for the application
//!
//! Every failure a caller can observe is one of the [`AppError`] variants.
//! Module-level errors (pricing, storage, payments, status guard) convert
//! into it explicitly so storage and processor details never leak into
//! responses.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    /// Malformed or out-of-range input, fixable by the caller
    #[error("{0}")]
    Validation(String),

    /// Resource or booking does not exist
    #[error("{0}")]
    NotFound(String),

    /// No availability, or the booking is in a state that forbids the request
    #[error("{0}")]
    Conflict(String),

    /// Actor lacks permission for the requested operation
    #[error("{0}")]
    Authorization(String),

    /// No actor identity was supplied with the request
    #[error("Missing actor identity")]
    Unauthenticated,

    /// Downstream payment or storage failure; retrying from scratch is safe
    #[error("{0}")]
    Service(String),

    /// The refund for a cancellation could not be issued
    #[error("{0}")]
    RefundFailed(String),
}

impl AppError {
    /// Stable machine-readable reason string
    pub fn reason(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Authorization(_) => "forbidden",
            AppError::Unauthenticated => "unauthenticated",
            AppError::Service(_) => "service_unavailable",
            AppError::RefundFailed(_) => "refund_failed",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Service(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::RefundFailed(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Whether the whole operation may be retried from scratch
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Service(_) | AppError::RefundFailed(_))
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn conflict<T: Into<String>>(msg: T) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn forbidden<T: Into<String>>(msg: T) -> Self {
        AppError::Authorization(msg.into())
    }

    pub fn service<T: Into<String>>(msg: T) -> Self {
        AppError::Service(msg.into())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// Error body returned to callers
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error_type: &'static str,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(reason = self.reason(), "Request failed: {}", self);
        }

        let body = ErrorResponse {
            error_type: self.reason(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
