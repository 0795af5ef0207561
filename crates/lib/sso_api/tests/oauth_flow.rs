//! Integration tests for the authorize, token and revoke endpoints.

mod common;

use axum::http::{StatusCode, header};
use common::*;
use tower::ServiceExt;

async fn authorize_code(state: &sso_api::AppState, scope: &str) -> String {
    let token = access_token(state, 42);
    let uri = format!(
        "/oauth/authorize?{}",
        form(&[
            ("client_id", "app1"),
            ("redirect_uri", REDIRECT),
            ("response_type", "code"),
            ("scope", scope),
            ("state", "st-1"),
        ])
    );
    let resp = app(state).oneshot(get(&uri, Some(&token))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
    let location = location(&resp);
    assert!(location.starts_with(REDIRECT), "{location}");
    assert_eq!(query_param(&location, "state").as_deref(), Some("st-1"));
    query_param(&location, "code").expect("code in redirect")
}

fn exchange(code: &str) -> axum::http::Request<axum::body::Body> {
    post_form(
        "/oauth/token",
        &[
            ("grant_type", "authorization_code"),
            ("client_id", "app1"),
            ("client_secret", "secret1"),
            ("code", code),
            ("redirect_uri", REDIRECT),
        ],
    )
}

fn refresh(token: &str) -> axum::http::Request<axum::body::Body> {
    post_form(
        "/oauth/token",
        &[
            ("grant_type", "refresh_token"),
            ("client_id", "app1"),
            ("refresh_token", token),
        ],
    )
}

#[tokio::test]
async fn code_exchange_and_rotation_over_http() {
    let (state, _) = state();
    let code = authorize_code(&state, "profile admin").await;

    let resp = app(&state).oneshot(exchange(&code)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
    let t1 = body_json(resp).await;
    assert_eq!(t1["token_type"], "Bearer");
    assert!(t1["expires_at"].as_i64().unwrap() > 0);
    let t1_refresh = t1["refresh_token"].as_str().unwrap().to_string();

    let replay = app(&state).oneshot(exchange(&code)).await.unwrap();
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(replay).await["error"], "invalid_grant");

    let resp = app(&state).oneshot(refresh(&t1_refresh)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let t2 = body_json(resp).await;
    assert_ne!(t2["refresh_token"].as_str().unwrap(), t1_refresh);

    let again = app(&state).oneshot(refresh(&t1_refresh)).await.unwrap();
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(again).await["error"], "invalid_grant");
}

#[tokio::test]
async fn token_endpoint_validates_request_shape() {
    let (state, _) = state();

    let resp = app(&state)
        .oneshot(post_form("/oauth/token", &[("grant_type", "password")]))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "unsupported_grant_type");

    let resp = app(&state)
        .oneshot(post_form(
            "/oauth/token",
            &[("grant_type", "authorization_code"), ("client_id", "app1")],
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "invalid_request");

    let resp = app(&state)
        .oneshot(post_form("/oauth/token", &[]))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["error"], "invalid_request");
}

#[tokio::test]
async fn wrong_client_secret_is_invalid_client_and_keeps_the_code() {
    let (state, _) = state();
    let code = authorize_code(&state, "openid").await;

    let resp = app(&state)
        .oneshot(post_form(
            "/oauth/token",
            &[
                ("grant_type", "authorization_code"),
                ("client_id", "app1"),
                ("client_secret", "wrong"),
                ("code", code.as_str()),
                ("redirect_uri", REDIRECT),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["error"], "invalid_client");

    let resp = app(&state).oneshot(exchange(&code)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn trailing_slash_redirect_is_refused_at_exchange() {
    let (state, _) = state();
    let code = authorize_code(&state, "openid").await;
    let resp = app(&state)
        .oneshot(post_form(
            "/oauth/token",
            &[
                ("grant_type", "authorization_code"),
                ("client_id", "app1"),
                ("client_secret", "secret1"),
                ("code", code.as_str()),
                ("redirect_uri", "https://app.test/cb/"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "invalid_grant");
}

#[tokio::test]
async fn unauthenticated_authorize_renders_login_form() {
    let (state, _) = state();
    let uri = format!(
        "/oauth/authorize?{}",
        form(&[
            ("client_id", "app1"),
            ("redirect_uri", REDIRECT),
            ("response_type", "code"),
            ("scope", "openid"),
            ("state", "abc"),
        ])
    );
    let resp = app(&state).oneshot(get(&uri, None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let page = body_text(resp).await;
    assert!(page.contains("<form"));
    assert!(page.contains(r#"name="state" value="abc""#));
}

#[tokio::test]
async fn authorize_ignores_a_token_in_the_link() {
    let (state, _) = state();
    let planted = access_token(&state, 7);
    let uri = format!(
        "/oauth/authorize?{}",
        form(&[
            ("client_id", "app1"),
            ("redirect_uri", REDIRECT),
            ("response_type", "code"),
            ("scope", "openid"),
            ("access_token", planted.as_str()),
        ])
    );
    let resp = app(&state).oneshot(get(&uri, None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get(header::LOCATION).is_none());
    let page = body_text(resp).await;
    assert!(page.contains("<form"));
    assert!(!page.contains(&planted));
}

#[tokio::test]
async fn unregistered_redirect_is_never_followed() {
    let (state, _) = state();
    let token = access_token(&state, 42);
    let uri = format!(
        "/oauth/authorize?{}",
        form(&[
            ("client_id", "app1"),
            ("redirect_uri", "https://evil.test/cb"),
            ("response_type", "code"),
            ("scope", "openid"),
        ])
    );
    let resp = app(&state).oneshot(get(&uri, Some(&token))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(resp.headers().get(header::LOCATION).is_none());
}

#[tokio::test]
async fn authorize_errors_are_redirected_with_state() {
    let (state, _) = state();
    let token = access_token(&state, 42);

    let uri = format!(
        "/oauth/authorize?{}",
        form(&[
            ("client_id", "app1"),
            ("redirect_uri", REDIRECT),
            ("response_type", "code"),
            ("scope", "admin"),
            ("state", "s9"),
        ])
    );
    let resp = app(&state).oneshot(get(&uri, Some(&token))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
    let location = location(&resp);
    assert_eq!(query_param(&location, "error").as_deref(), Some("invalid_scope"));
    assert_eq!(query_param(&location, "state").as_deref(), Some("s9"));
    assert!(query_param(&location, "code").is_none());

    let uri = format!(
        "/oauth/authorize?{}",
        form(&[
            ("client_id", "app1"),
            ("redirect_uri", REDIRECT),
            ("response_type", "token"),
            ("scope", "openid"),
        ])
    );
    let resp = app(&state).oneshot(get(&uri, Some(&token))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        query_param(&common::location(&resp), "error").as_deref(),
        Some("unsupported_response_type")
    );
}

#[tokio::test]
async fn login_form_sets_session_and_returns_to_authorize() {
    let (state, _) = state();
    let resp = app(&state)
        .oneshot(post_form(
            "/oauth/login",
            &[
                ("username", "u42"),
                ("password", PASSWORD),
                ("client_id", "app1"),
                ("redirect_uri", REDIRECT),
                ("response_type", "code"),
                ("scope", "openid"),
                ("state", "st"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let back = location(&resp);
    assert!(back.starts_with("/oauth/authorize?"), "{back}");
    let cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("session cookie")
        .to_string();
    assert!(cookie.starts_with("sso_access="));
    let session = cookie.split(';').next().unwrap().to_string();

    let request = axum::http::Request::builder()
        .uri(&back)
        .header(header::COOKIE, session)
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = app(&state).oneshot(request).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
    let redirect = location(&resp);
    assert!(query_param(&redirect, "code").is_some());
    assert_eq!(query_param(&redirect, "state").as_deref(), Some("st"));
}

#[tokio::test]
async fn login_form_rejects_bad_password() {
    let (state, _) = state();
    let resp = app(&state)
        .oneshot(post_form(
            "/oauth/login",
            &[
                ("username", "u42"),
                ("password", "nope"),
                ("client_id", "app1"),
                ("redirect_uri", REDIRECT),
                ("response_type", "code"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    assert!(body_text(resp).await.contains("Invalid username or password"));
}

#[tokio::test]
async fn revoked_refresh_token_cannot_be_used() {
    let (state, _) = state();
    let code = authorize_code(&state, "openid").await;
    let tokens = body_json(app(&state).oneshot(exchange(&code)).await.unwrap()).await;
    let refresh_token = tokens["refresh_token"].as_str().unwrap().to_string();

    let resp = app(&state)
        .oneshot(post_form(
            "/oauth/revoke",
            &[
                ("client_id", "app1"),
                ("token", refresh_token.as_str()),
                ("token_type_hint", "refresh_token"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Revoking again, or revoking junk, still succeeds.
    let resp = app(&state)
        .oneshot(post_form(
            "/oauth/revoke",
            &[("client_id", "app1"), ("token", "junk")],
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app(&state).oneshot(refresh(&refresh_token)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "invalid_grant");
}

#[tokio::test]
async fn non_form_bodies_get_an_oauth_error() {
    let (state, _) = state();

    let resp = app(&state)
        .oneshot(post_json(
            "/oauth/token",
            serde_json::json!({"grant_type": "refresh_token", "client_id": "app1"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "invalid_request");

    let resp = app(&state)
        .oneshot(post_json(
            "/oauth/revoke",
            serde_json::json!({"client_id": "app1", "token": "x"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "invalid_request");
}
