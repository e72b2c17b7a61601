//! Bearer token extraction.
//!
//! When `AUTH_TOKEN` is configured every request must carry
//! `Authorization: Bearer <AUTH_TOKEN>`. Without it the API is open, which is
//! the usual setup for an agent bound to localhost.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::AppError;
use crate::AppState;

/// Caller authorized to use the local API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthUser {
    /// Presented the configured token
    Token,
    /// No token is configured
    Anonymous,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.auth_token.as_deref() else {
            return Ok(AuthUser::Anonymous);
        };

        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|header| header.strip_prefix("Bearer "))
            .map(str::trim);

        match presented {
            Some(token) if token == expected => Ok(AuthUser::Token),
            Some(_) => {
                tracing::warn!("Rejected request with invalid bearer token");
                Err(AppError::Unauthorized)
            }
            None => Err(AppError::Unauthorized),
        }
    }
}
