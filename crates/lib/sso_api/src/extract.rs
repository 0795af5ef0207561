//! Body extractors whose rejections leave as OAuth2 error objects.
//!
//! axum's own `Form` and `Json` reject with plain-text bodies and statuses
//! such as 415 or 422. Clients of the token and account endpoints expect
//! `{"error": "invalid_request", ...}` instead.

use axum::extract::{FromRequest, Request};
use axum::{Form, Json};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::AppError;

/// `application/x-www-form-urlencoded` request body.
#[derive(Debug, Clone)]
pub struct OAuthForm<T>(pub T);

impl<S, T> FromRequest<S> for OAuthForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Form::<T>::from_request(req, state).await {
            Ok(Form(value)) => Ok(Self(value)),
            Err(rejection) => {
                debug!(status = %rejection.status(), "form body rejected");
                Err(AppError::InvalidRequest(rejection.body_text()))
            }
        }
    }
}

/// `application/json` request body.
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                debug!(status = %rejection.status(), "JSON body rejected");
                Err(AppError::InvalidRequest(rejection.body_text()))
            }
        }
    }
}
