//! Error types for the sync agent.
//!
//! [`SyncError`] covers the outbox and its collaborators; [`AppError`] is what
//! HTTP handlers return.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors raised by the outbox and its collaborators.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Key-value store read or write failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Filesystem error from the file-backed store
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote apply call failed
    #[error("Remote error: {0}")]
    Remote(String),

    /// Remote apply call did not complete in time
    #[error("Remote apply timed out after {0}ms")]
    Timeout(u64),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Engine rejected the operation
    #[error("Engine error: {0}")]
    Engine(#[from] fazenda_engine::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using SyncError.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Engine error: {0}")]
    Engine(#[from] fazenda_engine::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match &self {
            AppError::Sync(e) => {
                tracing::error!("Sync error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Sync error".to_string(),
                    Some(e.to_string()),
                )
            }
            AppError::Engine(e) => {
                tracing::warn!("Engine error: {:?}", e);
                (StatusCode::BAD_REQUEST, e.to_string(), None)
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string(), None),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            SyncError::Timeout(250).to_string(),
            "Remote apply timed out after 250ms"
        );
        assert_eq!(
            SyncError::Storage("disk full".into()).to_string(),
            "Storage error: disk full"
        );

        let engine: SyncError = fazenda_engine::Error::DuplicateAction("a-1".into()).into();
        assert!(engine.to_string().starts_with("Engine error"));
    }

    #[test]
    fn status_codes() {
        let bad = AppError::BadRequest("entity is required".into()).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let storage = AppError::from(SyncError::Storage("disk full".into())).into_response();
        assert_eq!(storage.status(), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(
            AppError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
