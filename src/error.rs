//! Application error types and their HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Error model used throughout request validation, relaying, and startup.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    InvalidRequest(String),
    /// Completion service failure. `detail` is logged, `message` is returned.
    #[error("{message}: {detail}")]
    Upstream { message: String, detail: String },
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Creates a `401 Unauthorized` error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Creates a `400 Bad Request` validation error surfaced verbatim.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Creates a completion service failure with an internal-only detail.
    ///
    /// The user-facing message is filled in by the route that owns the
    /// failure; see [`AppError::with_public_message`].
    pub fn upstream(detail: impl Into<String>) -> Self {
        Self::Upstream {
            message: "Upstream completion service failed.".to_string(),
            detail: detail.into(),
        }
    }

    /// Creates a generic internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Replaces the caller-visible message of an upstream failure.
    pub fn with_public_message(self, public: &str) -> Self {
        match self {
            Self::Upstream { detail, .. } => Self::Upstream {
                message: public.to_string(),
                detail,
            },
            other => other,
        }
    }

    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { .. } | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            AppError::Unauthorized(message)
            | AppError::InvalidRequest(message)
            | AppError::Internal(message) => message,
            AppError::Upstream { message, .. } => message,
        };

        (status, Json(ErrorPayload { error })).into_response()
    }
}
