//! OAuth2 authorization-code endpoints.
//!
//! Code exchange, refresh and revocation run on a spawned task so a client
//! that disconnects mid-request cannot cancel them between the store's
//! consume and write steps.

use std::future::Future;

use axum::Json;
use axum::extract::{Form, Query, State};
use axum::http::header::{CACHE_CONTROL, LOCATION, PRAGMA};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;
use sso_core::auth::AuthError;
use sso_core::auth::engine::parse_scopes;
use tracing::{debug, info};
use url::Url;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::OAuthForm;
use crate::middleware::auth::authenticated_claims;
use crate::models::{AuthorizeParams, LoginForm, RevokeRequest, TokenRequest, TokenResponse};
use crate::routes;
use crate::services::{cookies, pages};

/// Run an engine call to completion even if the request is dropped.
async fn run_detached<T, F>(fut: F) -> AppResult<T>
where
    F: Future<Output = Result<T, AuthError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(fut)
        .await
        .map_err(|e| AppError::Internal(format!("grant task failed: {e}")))?
        .map_err(AppError::from)
}

fn required(value: Option<String>, name: &str) -> AppResult<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::InvalidRequest(format!("Missing required parameter: {name}")))
}

/// Append query parameters to a registered redirect URI.
fn redirect_with(redirect_uri: &str, pairs: &[(&str, &str)]) -> Option<String> {
    let mut url = Url::parse(redirect_uri).ok()?;
    {
        let mut query = url.query_pairs_mut();
        for (k, v) in pairs {
            query.append_pair(k, v);
        }
    }
    Some(url.into())
}

fn found(location: String) -> Response {
    (StatusCode::FOUND, [(LOCATION, location)]).into_response()
}

fn error_redirect(params: &AuthorizeParams, code: &str, description: &str) -> Response {
    let mut pairs = vec![("error", code), ("error_description", description)];
    if let Some(state) = params.state.as_deref() {
        pairs.push(("state", state));
    }
    match redirect_with(&params.redirect_uri, &pairs) {
        Some(location) => found(location),
        None => (
            StatusCode::BAD_REQUEST,
            pages::error_page("Authorization failed", description),
        )
            .into_response(),
    }
}

/// `GET /oauth/authorize`: issue a code to an authenticated caller, or
/// render the login form.
pub async fn authorize_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<AuthorizeParams>,
) -> Response {
    // Nothing is redirected until the client and its redirect URI check out.
    let client = match state
        .engine
        .validate_client_credentials(&params.client_id, None)
        .await
    {
        Ok(client) => client,
        Err(AuthError::BackendUnavailable(_)) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                pages::error_page("Temporarily unavailable", "Please try again shortly."),
            )
                .into_response();
        }
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                pages::error_page("Unknown application", "The application is not recognised."),
            )
                .into_response();
        }
    };
    if !client.has_redirect_uri(&params.redirect_uri) {
        debug!(client_id = %params.client_id, "authorize with unregistered redirect URI");
        return (
            StatusCode::BAD_REQUEST,
            pages::error_page(
                "Invalid redirect URI",
                "The redirect URI is not registered for this application.",
            ),
        )
            .into_response();
    }
    if params.response_type != "code" {
        return error_redirect(
            &params,
            "unsupported_response_type",
            "Only response_type=code is supported",
        );
    }

    let Some(claims) = authenticated_claims(&state, &headers) else {
        return pages::login_page(&params, None).into_response();
    };

    let scopes = parse_scopes(params.scope.as_deref().unwrap_or_default());
    match state
        .engine
        .authorize_subject(claims.user_id, &params.client_id, &scopes)
        .await
    {
        Ok(issued) => {
            let mut pairs = vec![("code", issued.code.as_str())];
            if let Some(s) = params.state.as_deref() {
                pairs.push(("state", s));
            }
            match redirect_with(&params.redirect_uri, &pairs) {
                Some(location) => found(location),
                None => (
                    StatusCode::BAD_REQUEST,
                    pages::error_page("Invalid redirect URI", "The redirect URI is malformed."),
                )
                    .into_response(),
            }
        }
        Err(AuthError::SubjectDisabled) => {
            error_redirect(&params, "access_denied", "The account is disabled")
        }
        Err(e) => {
            let (_, code, description) = AppError::from(e).parts();
            error_redirect(&params, code, &description)
        }
    }
}

/// `POST /oauth/login`: check the login form and return to the authorize step.
pub async fn login_form_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let subject = match state.engine.authenticate(&form.username, &form.password).await {
        Ok(subject) => subject,
        Err(AuthError::BackendUnavailable(_)) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                pages::login_page(&form.authorize, Some("Service unavailable, please retry.")),
            )
                .into_response();
        }
        Err(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                pages::login_page(&form.authorize, Some("Invalid username or password.")),
            )
                .into_response();
        }
    };

    let issued = match state.engine.codec().issue_access(subject.id) {
        Ok(issued) => issued,
        Err(e) => return AppError::from(e).into_response(),
    };
    let max_age = state.engine.codec().access_ttl().num_seconds();
    let jar = jar.add(cookies::session_cookie(
        &issued.access_token,
        max_age,
        state.config.secure_cookies,
    ));

    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query
        .append_pair("client_id", &form.authorize.client_id)
        .append_pair("redirect_uri", &form.authorize.redirect_uri)
        .append_pair("response_type", &form.authorize.response_type);
    if let Some(scope) = form.authorize.scope.as_deref() {
        query.append_pair("scope", scope);
    }
    if let Some(s) = form.authorize.state.as_deref() {
        query.append_pair("state", s);
    }
    let target = format!("{}?{}", routes::AUTHORIZE, query.finish());

    (jar, Redirect::to(&target)).into_response()
}

/// `POST /oauth/token`: authorization-code and refresh-token grants.
pub async fn token_handler(
    State(state): State<AppState>,
    OAuthForm(body): OAuthForm<TokenRequest>,
) -> AppResult<Response> {
    let grant_type = required(body.grant_type, "grant_type")?;
    let pair = match grant_type.as_str() {
        "authorization_code" => {
            let client_id = required(body.client_id, "client_id")?;
            let client_secret = required(body.client_secret, "client_secret")?;
            let code = required(body.code, "code")?;
            let redirect_uri = required(body.redirect_uri, "redirect_uri")?;

            state
                .engine
                .validate_client_credentials(&client_id, Some(&client_secret))
                .await?;
            let engine = state.engine.clone();
            run_detached(async move {
                engine
                    .exchange_code_for_tokens(&code, &client_id, &redirect_uri)
                    .await
            })
            .await?
        }
        "refresh_token" => {
            let client_id = required(body.client_id, "client_id")?;
            let refresh_token = required(body.refresh_token, "refresh_token")?;

            state
                .engine
                .validate_client_credentials(&client_id, body.client_secret.as_deref())
                .await?;
            let engine = state.engine.clone();
            run_detached(async move { engine.refresh_tokens(&refresh_token, &client_id).await })
                .await?
        }
        other => return Err(AppError::UnsupportedGrantType(other.to_string())),
    };

    info!(grant_type = %grant_type, "token grant succeeded");
    Ok((
        [(CACHE_CONTROL, "no-store"), (PRAGMA, "no-cache")],
        Json(TokenResponse::from(pair)),
    )
        .into_response())
}

/// `POST /oauth/revoke`: revoke a refresh token. Unknown tokens succeed.
pub async fn revoke_handler(
    State(state): State<AppState>,
    OAuthForm(body): OAuthForm<RevokeRequest>,
) -> AppResult<StatusCode> {
    let client_id = required(body.client_id, "client_id")?;
    let token = required(body.token, "token")?;
    if let Some(hint) = body.token_type_hint.as_deref()
        && hint != "refresh_token"
    {
        debug!(hint, "ignoring token_type_hint");
    }

    state
        .engine
        .validate_client_credentials(&client_id, body.client_secret.as_deref())
        .await?;
    let engine = state.engine.clone();
    run_detached(async move { engine.revoke_refresh_token(&token, &client_id).await }).await?;
    Ok(StatusCode::OK)
}
