//! Account request handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum_extra::extract::CookieJar;
use sso_core::auth::engine::Registration;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::ApiJson;
use crate::models::{LoginRequest, LoginResponse, RegisterRequest, SubjectResponse};
use crate::services::cookies;

/// `POST /api/register`: create a new subject.
pub async fn register_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<SubjectResponse>)> {
    let subject = state
        .engine
        .register(Registration {
            username: body.username,
            email: body.email,
            password: body.password,
            full_name: body.full_name,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(subject.into())))
}

/// `POST /api/login`: authenticate with username or email and password.
///
/// Returns an access token and sets the session cookie used by the
/// authorize endpoint.
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<(CookieJar, Json<LoginResponse>)> {
    let subject = state.engine.authenticate(&body.login, &body.password).await?;
    let issued = state.engine.codec().issue_access(subject.id)?;

    let max_age = state.engine.codec().access_ttl().num_seconds();
    let jar = jar.add(cookies::session_cookie(
        &issued.access_token,
        max_age,
        state.config.secure_cookies,
    ));

    Ok((
        jar,
        Json(LoginResponse {
            access_token: issued.access_token,
            token_type: "Bearer".into(),
            expires_at: issued.access_expires_at,
            subject: subject.into(),
        }),
    ))
}

/// `POST /api/logout`: clear the session cookie.
pub async fn logout_handler(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, StatusCode) {
    (
        jar.add(cookies::clear_session_cookie(state.config.secure_cookies)),
        StatusCode::NO_CONTENT,
    )
}
