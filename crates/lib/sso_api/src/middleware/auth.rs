//! Authentication middleware: access-token extraction, verification and
//! permission gating.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Uri};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use sso_core::models::auth::TokenClaims;
use tracing::debug;

use crate::AppState;
use crate::error::AppError;
use crate::services::cookies::SESSION_COOKIE;

/// Key used to store `TokenClaims` in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub TokenClaims);

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Locate an access token for an API call: `Authorization: Bearer`, then
/// `?access_token=`, then the session cookie.
pub fn extract_access_token(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    if let Some(token) = bearer_token(headers) {
        return Some(token);
    }

    if let Some(query) = uri.query()
        && let Some((_, token)) = url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, v)| k == "access_token" && !v.is_empty())
    {
        return Some(token.into_owned());
    }

    session_cookie(headers)
}

/// Locate the caller's own session: `Authorization: Bearer`, then the
/// session cookie. URL parameters are never consulted, since anyone can
/// place a token in a link they hand to someone else.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| session_cookie(headers))
}

/// Verify the session the caller presents for an interactive step.
pub fn authenticated_claims(state: &AppState, headers: &HeaderMap) -> Option<TokenClaims> {
    let token = extract_session_token(headers)?;
    match state.engine.validate_access_token(&token) {
        Ok(claims) => Some(claims),
        Err(e) => {
            debug!(error = %e, "presented session token rejected");
            None
        }
    }
}

/// Axum middleware: verifies the access token and injects `AuthenticatedUser`
/// into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_access_token(request.headers(), request.uri())
        .ok_or_else(|| AppError::Unauthorized("Missing access token".into()))?;

    let claims = state
        .engine
        .validate_access_token(&token)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

    request.extensions_mut().insert(AuthenticatedUser(claims));

    Ok(next.run(request).await)
}

/// A (resource, action) pair a route requires.
#[derive(Debug, Clone, Copy)]
pub struct RequiredPermission {
    pub resource: &'static str,
    pub action: &'static str,
}

impl RequiredPermission {
    pub const fn new(resource: &'static str, action: &'static str) -> Self {
        Self { resource, action }
    }
}

/// Axum middleware: requires the authenticated caller to hold a permission.
///
/// Must run inside `require_auth`.
pub async fn require_permission(
    State((state, required)): State<(AppState, RequiredPermission)>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let subject_id = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|u| u.0.user_id)
        .ok_or_else(|| AppError::Unauthorized("Missing access token".into()))?;

    if !state
        .resolver
        .has_permission(subject_id, required.resource, required.action)
        .await
    {
        return Err(AppError::Forbidden(format!(
            "Requires permission {}:{}",
            required.resource, required.action
        )));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum::http::header::COOKIE;

    #[test]
    fn bearer_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer header-token"));
        headers.insert(COOKIE, HeaderValue::from_static("sso_access=cookie-token"));
        let uri: Uri = "/userinfo?access_token=query-token".parse().unwrap();
        assert_eq!(
            extract_access_token(&headers, &uri).as_deref(),
            Some("header-token")
        );
    }

    #[test]
    fn query_parameter_then_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("sso_access=cookie-token"));
        let with_query: Uri = "/userinfo?access_token=query-token".parse().unwrap();
        let without_query: Uri = "/userinfo".parse().unwrap();
        assert_eq!(
            extract_access_token(&headers, &with_query).as_deref(),
            Some("query-token")
        );
        assert_eq!(
            extract_access_token(&headers, &without_query).as_deref(),
            Some("cookie-token")
        );
    }

    #[test]
    fn session_token_ignores_the_query_string() {
        let mut headers = HeaderMap::new();
        assert!(extract_session_token(&headers).is_none());

        headers.insert(COOKIE, HeaderValue::from_static("sso_access=cookie-token"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("cookie-token"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer header-token"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("header-token"));
    }

    #[test]
    fn other_schemes_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        let uri: Uri = "/userinfo".parse().unwrap();
        assert!(extract_access_token(&headers, &uri).is_none());
    }
}
