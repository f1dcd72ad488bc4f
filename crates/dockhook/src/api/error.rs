//! API error types
//!
//! Handlers return [`AppError`]. Responses carry a generic message; the
//! underlying error is only logged.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use dockhook_api::ErrorResponse;
use dockhook_core::{ActionError, CoreError};
use tracing::error;

/// Error with the status code it maps to
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub error: ErrorResponse,
}

impl AppError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            error: ErrorResponse {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "authentication required",
        )
    }

    pub fn too_many_requests() -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "TOO_MANY_REQUESTS",
            "too many attempts",
        )
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "internal server error",
        )
    }
}

impl From<ActionError> for AppError {
    fn from(err: ActionError) -> Self {
        error!(error = %err, "container action failed");
        if err.is_not_found() {
            AppError::not_found("container not found")
        } else {
            AppError::internal()
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::HostNotFound(_) => AppError::not_found("host not found"),
            other => {
                error!(error = %other, "request failed");
                AppError::internal()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}
