use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::infra::store::StoreError;
use crate::security::{jwt::JwtError, password::PasswordError};

/// Error taxonomy for the session endpoints. Every variant renders as an
/// HTTP status plus a `{ "message": … }` body; nothing is swallowed.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed or duplicate input, user-correctable.
    #[error("{0}")]
    Validation(String),

    /// Login mismatch. The message never reveals whether the email exists.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Unknown, expired, revoked or already-rotated refresh token. The cases
    /// are deliberately indistinguishable to the caller.
    #[error("invalid refresh token")]
    InvalidRefreshToken,

    /// Missing, expired or revoked access credential on a protected call.
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("rate limited")]
    RateLimited,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::InvalidCredentials
            | AuthError::InvalidRefreshToken
            | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            // Duplicate email is user-correctable; everything else from the
            // store is a transient outage and safe to retry as a whole.
            AuthError::Store(StoreError::DuplicateEmail) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let message = match &self {
            // Don't leak driver details to the caller.
            AuthError::Store(StoreError::DuplicateEmail) => "email already registered".to_string(),
            AuthError::Store(_) => "store unavailable".to_string(),
            AuthError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}
