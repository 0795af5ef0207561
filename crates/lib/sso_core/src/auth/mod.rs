//! Authentication and authorization logic.
//!
//! Provides the token codec, password hashing, the authorization-code /
//! refresh-rotation engine and the RBAC permission resolver.

pub mod engine;
pub mod jwt;
pub mod password;
pub mod permissions;

use thiserror::Error;

use crate::credentials::CredentialStoreError;
use crate::store::StoreError;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid client")]
    InvalidClient,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Requested scope must not be empty")]
    EmptyScopeRequest,

    #[error("No valid scopes requested")]
    NoValidScopes,

    #[error("Redirect URI is not registered for this client")]
    InvalidRedirectUri,

    #[error("Invalid or expired authorization code")]
    InvalidOrExpiredCode,

    #[error("Grant was issued to another client")]
    ClientMismatch,

    #[error("Invalid or expired refresh token")]
    InvalidOrExpiredToken,

    #[error("Refresh token has been revoked")]
    TokenRevoked,

    #[error("Subject is disabled")]
    SubjectDisabled,

    #[error("Invalid credentials")]
    CredentialError,

    #[error("Unexpected signing method")]
    InvalidSignatureMethod,

    #[error("Token expired or malformed")]
    ExpiredOrMalformed,

    #[error("Token signing failed: {0}")]
    SigningError(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// OAuth2 error code reported to callers.
    ///
    /// Grant failures collapse onto `invalid_grant` so a caller probing codes
    /// or tokens learns nothing about why the grant was refused.
    pub fn oauth_error(&self) -> &'static str {
        match self {
            AuthError::InvalidClient => "invalid_client",
            AuthError::InvalidRequest(_)
            | AuthError::EmptyScopeRequest
            | AuthError::ValidationError(_) => "invalid_request",
            AuthError::NoValidScopes => "invalid_scope",
            AuthError::InvalidRedirectUri
            | AuthError::InvalidOrExpiredCode
            | AuthError::ClientMismatch
            | AuthError::InvalidOrExpiredToken
            | AuthError::TokenRevoked
            | AuthError::SubjectDisabled => "invalid_grant",
            AuthError::CredentialError => "access_denied",
            AuthError::InvalidSignatureMethod | AuthError::ExpiredOrMalformed => "invalid_token",
            AuthError::BackendUnavailable(_) => "temporarily_unavailable",
            AuthError::SigningError(_) | AuthError::Internal(_) => "server_error",
        }
    }

    /// Whether the caller may retry the same request with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::BackendUnavailable(_))
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Serialization(e) => AuthError::Internal(format!("record encoding: {e}")),
            other => AuthError::BackendUnavailable(other.to_string()),
        }
    }
}

impl From<CredentialStoreError> for AuthError {
    fn from(e: CredentialStoreError) -> Self {
        match e {
            CredentialStoreError::Conflict(msg) => AuthError::ValidationError(msg),
            other => AuthError::BackendUnavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_failures_are_indistinguishable() {
        for e in [
            AuthError::InvalidOrExpiredCode,
            AuthError::ClientMismatch,
            AuthError::InvalidOrExpiredToken,
            AuthError::TokenRevoked,
            AuthError::SubjectDisabled,
            AuthError::InvalidRedirectUri,
        ] {
            assert_eq!(e.oauth_error(), "invalid_grant", "{e}");
        }
    }

    #[test]
    fn only_backend_errors_are_retryable() {
        assert!(AuthError::BackendUnavailable("timeout".into()).is_retryable());
        assert!(!AuthError::SigningError("bad key".into()).is_retryable());
        assert!(!AuthError::InvalidClient.is_retryable());
    }

    #[test]
    fn store_errors_become_backend_unavailable() {
        let e: AuthError = StoreError::Backend("connection reset".into()).into();
        assert!(matches!(e, AuthError::BackendUnavailable(_)));
    }
}
