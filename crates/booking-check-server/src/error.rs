//! Server error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Registry, broker or delivery error.
    #[error(transparent)]
    Core(#[from] booking_check_core::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Telegram Bot API error. Never contains the bot token.
    #[error("telegram error: {0}")]
    Telegram(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP API error.
#[derive(Debug)]
pub enum ApiError {
    /// Internal server error. Details are logged, never returned.
    Internal,
}

impl ApiError {
    /// Log `err` and produce an internal error response.
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "{}", context);
        ApiError::Internal
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// HTTP status code.
    pub status: u16,
    /// Error message.
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
        };

        let body = ErrorResponse {
            status: status.as_u16(),
            message: message.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
