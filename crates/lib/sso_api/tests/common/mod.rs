//! Shared fixtures for router tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use sso_api::config::ApiConfig;
use sso_api::{AppState, router};
use sso_core::config::AuthConfig;
use sso_core::credentials::memory::MemoryCredentialStore;
use sso_core::models::credentials::{Client, Permission, Role, Settings, Subject};
use sso_core::store::memory::MemoryStore;

pub const REDIRECT: &str = "https://app.test/cb";
pub const PASSWORD: &str = "correct horse";

/// Subject 42 (`u42`) holds `user:read` through the `admin` role.
/// Subject 7 (`u7`) has no roles.
pub fn state() -> (AppState, Arc<MemoryCredentialStore>) {
    let credentials = Arc::new(MemoryCredentialStore::new());
    credentials.insert_client(Client {
        id: 1,
        name: "App One".into(),
        description: None,
        client_id: "app1".into(),
        client_secret: "secret1".into(),
        redirect_uris: vec![REDIRECT.into()],
        allowed_scopes: vec!["openid".into(), "profile".into()],
        active: true,
        settings: Settings::new(),
    });
    let hash = bcrypt::hash(PASSWORD, 4).unwrap();
    for (id, name) in [(42, "u42"), (7, "u7")] {
        credentials.insert_subject(
            Subject {
                id,
                username: name.into(),
                email: format!("{name}@example.test"),
                full_name: None,
                active: true,
                custom_attributes: Settings::new(),
            },
            &hash,
        );
    }
    credentials.insert_role(Role {
        id: 1,
        name: "admin".into(),
        description: None,
    });
    credentials.insert_permission(Permission {
        id: 1,
        name: "user:read".into(),
        description: None,
        resource: "user".into(),
        action: "read".into(),
    });
    credentials.grant_permission(1, 1);
    credentials.assign_role(42, 1);

    let state = AppState::new(
        credentials.clone(),
        Arc::new(MemoryStore::new()),
        AuthConfig::with_secret("router-test-secret"),
        ApiConfig::default(),
    );
    (state, credentials)
}

pub fn app(state: &AppState) -> Router {
    router(state.clone())
}

pub fn access_token(state: &AppState, subject_id: i64) -> String {
    state.engine.codec().issue_access(subject_id).unwrap().access_token
}

pub fn form(pairs: &[(&str, &str)]) -> String {
    let mut s = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in pairs {
        s.append_pair(k, v);
    }
    s.finish()
}

pub fn post_form(uri: &str, pairs: &[(&str, &str)]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form(pairs)))
        .unwrap()
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(resp: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse JSON")
}

pub async fn body_text(resp: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn location(resp: &Response<Body>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("Location header")
        .to_string()
}

/// Value of query parameter `name` in `url`.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let parsed = url::Url::parse(url)
        .or_else(|_| url::Url::parse(&format!("http://localhost{url}")))
        .ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}
