use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Every failure the auth core surfaces to callers. Raw store or crypto
/// errors never escape; they are translated into one of these kinds.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("Email already registered")]
    DuplicateEmail,

    /// One message for unknown email and wrong password, so callers cannot
    /// probe which addresses are registered.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Too many login attempts. Please wait {retry_after} seconds.")]
    RateLimited { retry_after: u64 },

    /// Covers malformed, forged and expired tokens identically.
    #[error("Invalid or expired token")]
    TokenInvalid,

    /// The only retryable kind: the underlying store is unreachable.
    #[error("Service temporarily unavailable")]
    StoreUnavailable(#[source] sqlx::Error),

    #[error("Internal error")]
    Internal(anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidEmail | AuthError::WeakPassword(_) => StatusCode::BAD_REQUEST,
            AuthError::DuplicateEmail => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::TokenInvalid => StatusCode::UNAUTHORIZED,
            AuthError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            AuthError::StoreUnavailable(e) => error!(error = %e, "credential store unavailable"),
            AuthError::Internal(e) => error!(error = %e, "internal auth error"),
            _ => {}
        }

        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));

        if let AuthError::RateLimited { retry_after } = self {
            return (status, [("Retry-After", retry_after.to_string())], body).into_response();
        }
        (status, body).into_response()
    }
}
