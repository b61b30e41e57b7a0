//! Error types for enquete-rs.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Field-level validation failures. The messages are returned to the
    /// client as a list alongside a generic summary message.
    #[error("Validation failed")]
    Validation(Vec<String>),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Action against a poll that is expired or deactivated.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Rate limited")]
    RateLimited,

    // === Server Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Build a validation error from a single message.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) | Self::Validation(_) | Self::InvalidState(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,

            // 5xx Server Errors
            Self::Database(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// The client-facing message. Server error detail is suppressed unless
    /// the process runs in development mode (`ENQUETE_ENV=development`).
    #[must_use]
    pub fn public_message(&self) -> String {
        if self.is_server_error() && !is_development() {
            return "Internal server error".to_string();
        }
        match self {
            Self::Validation(_) => "Validation failed".to_string(),
            other => other.to_string(),
        }
    }
}

fn is_development() -> bool {
    std::env::var("ENQUETE_ENV").is_ok_and(|env| env == "development")
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Log server errors
        if self.is_server_error() {
            tracing::error!(error = %self, status = %status, "Server error occurred");
        } else {
            tracing::debug!(error = %self, status = %status, "Client error occurred");
        }

        let body = match &self {
            Self::Validation(errors) => Json(json!({
                "message": self.public_message(),
                "errors": errors,
            })),
            _ => Json(json!({
                "message": self.public_message(),
            })),
        };

        (status, body).into_response()
    }
}

// === From implementations ===

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let messages = err
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    e.message
                        .as_ref()
                        .map_or_else(|| format!("{field}: invalid value"), ToString::to_string)
                })
            })
            .collect();
        Self::Validation(messages)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::NotFound("poll".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Unauthorized("no token".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Forbidden("not owner".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::InvalidState("poll expired".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Conflict("duplicate report".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::RateLimited.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::Database("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_collects_messages() {
        let err = AppError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        match err {
            AppError::Validation(msgs) => assert_eq!(msgs.len(), 2),
            _ => panic!("expected Validation"),
        }
    }

    #[test]
    fn test_server_error_detail_suppressed() {
        // ENQUETE_ENV is not set to development in tests
        let err = AppError::Database("connection refused to 10.0.0.1".into());
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::NotFound("Poll abc not found".into());
        assert!(err.public_message().contains("abc"));
    }
}
