//! # sso_api
//!
//! HTTP surface of the SSO server: the OAuth2 authorize, token and revoke
//! endpoints, interactive login, account endpoints and permission checks.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use sqlx::PgPool;
use sso_core::auth::engine::AuthorizationEngine;
use sso_core::auth::permissions::PermissionResolver;
use sso_core::config::AuthConfig;
use sso_core::credentials::CredentialStore;
use sso_core::store::EphemeralStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{auth, health, oauth, permissions, userinfo};
use crate::middleware::auth::{RequiredPermission, require_auth, require_permission};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Code issuance, exchange, rotation and login.
    pub engine: AuthorizationEngine,
    /// RBAC checks.
    pub resolver: PermissionResolver,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        store: Arc<dyn EphemeralStore>,
        auth: AuthConfig,
        config: ApiConfig,
    ) -> Self {
        let resolver = PermissionResolver::new(credentials.clone(), auth.store_timeout);
        let engine = AuthorizationEngine::new(credentials, store, auth);
        Self {
            engine,
            resolver,
            config,
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `sso_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sso_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::HEALTH, get(health::health_handler))
        .route(routes::AUTHORIZE, get(oauth::authorize_handler))
        .route(routes::LOGIN_FORM, post(oauth::login_form_handler))
        .route(routes::TOKEN, post(oauth::token_handler))
        .route(routes::REVOKE, post(oauth::revoke_handler))
        .route(routes::REGISTER, post(auth::register_handler))
        .route(routes::LOGIN, post(auth::login_handler))
        .route(routes::LOGOUT, post(auth::logout_handler));

    // Gated on ("user", "read") on top of authentication
    let gated = Router::new()
        .route(
            routes::SUBJECT_PERMISSION_CHECK,
            get(permissions::check_subject_handler),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            (state.clone(), RequiredPermission::new("user", "read")),
            require_permission,
        ));

    // Protected routes (require auth)
    let protected = Router::new()
        .route(routes::USERINFO, get(userinfo::userinfo_handler))
        .route(routes::PERMISSION_CHECK, get(permissions::check_own_handler))
        .merge(gated)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
