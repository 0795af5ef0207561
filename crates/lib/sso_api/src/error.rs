//! Application error types.
//!
//! Every error leaves the server as an OAuth2 error object
//! (`{"error", "error_description"}`).

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use sso_core::auth::AuthError;
use thiserror::Error;
use tracing::{error, warn};

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Description used for every `invalid_grant`, whatever the cause.
const GENERIC_GRANT_DESCRIPTION: &str =
    "The provided authorization grant is invalid, expired, revoked or was issued to another client";

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    /// HTTP status, OAuth2 error code and caller-facing description.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Auth(e) => {
                let code = e.oauth_error();
                match code {
                    "invalid_grant" => (
                        StatusCode::BAD_REQUEST,
                        code,
                        GENERIC_GRANT_DESCRIPTION.into(),
                    ),
                    "invalid_client" => (
                        StatusCode::UNAUTHORIZED,
                        code,
                        "Client authentication failed".into(),
                    ),
                    "access_denied" | "invalid_token" => {
                        (StatusCode::UNAUTHORIZED, code, e.to_string())
                    }
                    "temporarily_unavailable" => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        code,
                        "The service is temporarily unavailable, retry later".into(),
                    ),
                    "server_error" => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        code,
                        "Internal server error".into(),
                    ),
                    _ => (StatusCode::BAD_REQUEST, code, e.to_string()),
                }
            }
            AppError::InvalidRequest(m) => (StatusCode::BAD_REQUEST, "invalid_request", m.clone()),
            AppError::UnsupportedGrantType(g) => (
                StatusCode::BAD_REQUEST,
                "unsupported_grant_type",
                format!("Grant type '{g}' is not supported"),
            ),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "invalid_token", m.clone()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "insufficient_scope", m.clone()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.clone()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "Internal server error".into(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, description) = self.parts();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "request failed");
        } else if matches!(self, AppError::Auth(_)) {
            warn!(error = %self, code, "request refused");
        }

        let body = Json(ErrorResponse {
            error: code.to_string(),
            error_description: description,
        });
        let mut response = (status, body).into_response();
        let headers = response.headers_mut();
        if code == "invalid_token" {
            headers.insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer error=\"invalid_token\""),
            );
        }
        if status == StatusCode::SERVICE_UNAVAILABLE {
            headers.insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}
