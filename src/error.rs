use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Error taxonomy for the authentication core.
///
/// Every authentication-path failure is converted to one of these kinds at
/// the service boundary; no store or crypto error crosses it unwrapped.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is temporarily locked. Try again later.")]
    AccountLocked,

    #[error("Account is not active (status: {0})")]
    AccountNotActive(String),

    #[error("Account does not have the required privilege")]
    InsufficientPrivilege,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Authentication required")]
    MissingToken,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Token expired")]
    TokenExpired,

    #[error("Password reset token is invalid or has expired")]
    ResetTokenInvalid,

    #[error("Current password is incorrect")]
    CurrentPasswordIncorrect,

    #[error("Forbidden: {0}")]
    PermissionDenied(String),

    #[error("Too many requests. Please try again later.")]
    RateLimited(Option<u64>),

    #[error("Stored credential is corrupt")]
    CorruptCredential,

    #[error("Store error: {0}")]
    Store(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorBody {
            error: String,
        }

        let retry_after = match self {
            AuthError::RateLimited(secs) => secs,
            _ => None,
        };

        let (status, message) = match &self {
            AuthError::Validation(_)
            | AuthError::ResetTokenInvalid
            | AuthError::CurrentPasswordIncorrect => (StatusCode::BAD_REQUEST, self.to_string()),

            // Deliberately generic: unknown identifier and wrong secret are
            // indistinguishable from the outside.
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),

            AuthError::AccountLocked
            | AuthError::AccountNotActive(_)
            | AuthError::AuthenticationFailed(_)
            | AuthError::MissingToken
            | AuthError::TokenInvalid
            | AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, self.to_string()),

            AuthError::InsufficientPrivilege | AuthError::PermissionDenied(_) => {
                (StatusCode::FORBIDDEN, self.to_string())
            }

            AuthError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),

            AuthError::CorruptCredential => {
                tracing::error!("Stored credential failed to parse");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AuthError::Store(err) => {
                tracing::error!(error = %err, "Store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AuthError::Internal(err) => {
                tracing::error!(error = %err, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let mut res = (status, Json(ErrorBody { error: message })).into_response();

        if let Some(retry) = retry_after {
            res.headers_mut()
                .insert(axum::http::header::RETRY_AFTER, retry.into());
        }

        res
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Store(anyhow::Error::new(err))
    }
}
