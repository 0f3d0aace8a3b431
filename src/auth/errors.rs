//! Authentication error types.

use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::api::ApiError;
use crate::credentials::CredentialError;
use crate::jwt::JwtError;

/// Everything the authentication gate and extractors can fail with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Authorization header is not a well-formed Basic or Bearer envelope
    #[error("Malformed credential")]
    MalformedCredential,
    #[error("Email is already registered")]
    DuplicateEmail,
    /// Unknown email and wrong password are deliberately indistinguishable
    #[error("Invalid login information")]
    InvalidCredentials,
    #[error("Invalid token")]
    InvalidToken,
    /// Reported like a malformed credential so callers cannot tell which check failed
    #[error("Malformed credential")]
    TypeMismatch,
    /// Token expired or blocked
    #[error("Token has expired or been revoked")]
    Unauthorized,
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Insufficient permissions")]
    InsufficientRole,
    #[error("Internal error")]
    Internal,
}

impl AuthError {
    pub(crate) fn internal(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        AuthError::Internal
    }
}

impl From<CredentialError> for AuthError {
    fn from(_: CredentialError) -> Self {
        AuthError::MalformedCredential
    }
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::Expired => AuthError::Unauthorized,
            JwtError::TypeMismatch => AuthError::TypeMismatch,
            JwtError::Malformed | JwtError::InvalidToken(_) => AuthError::InvalidToken,
            JwtError::Encoding(e) => AuthError::internal("Failed to sign token", e),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
