//! Authentication error types.

use thiserror::Error;

/// Authentication and authorization errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingAuthHeader,

    #[error("invalid authorization header format")]
    InvalidAuthHeader,

    #[error("invalid bearer token")]
    InvalidToken,

    #[error("invalid password")]
    InvalidPassword,

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error("invalid or expired session token: {0}")]
    InvalidSession(String),

    #[error("metadata bundle signature verification failed")]
    InvalidBundleSignature,
}

impl From<AuthError> for mktplace_common::Error {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingAuthHeader => Self::MissingAuth,
            AuthError::InvalidAuthHeader | AuthError::InvalidToken => Self::InvalidToken,
            other => Self::internal(other.to_string()),
        }
    }
}
