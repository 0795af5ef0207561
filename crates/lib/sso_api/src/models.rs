//! Request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sso_core::models::auth::TokenDetails;
use sso_core::models::credentials::{Settings, Subject};

/// OAuth2 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_description: String,
}

/// `GET /oauth/authorize` query parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizeParams {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default)]
    pub response_type: String,
    pub scope: Option<String>,
    pub state: Option<String>,
}

/// Login form posted from the authorize page.
///
/// Carries the original authorize parameters as hidden fields.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(flatten)]
    pub authorize: AuthorizeParams,
}

/// `POST /oauth/token` form body.
///
/// Every field is optional so missing ones surface as `invalid_request`
/// rather than an extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub refresh_token: Option<String>,
}

/// `POST /oauth/revoke` form body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RevokeRequest {
    pub token: Option<String>,
    pub token_type_hint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Token endpoint success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
    /// Access token expiry as a unix timestamp.
    pub expires_at: i64,
}

impl From<TokenDetails> for TokenResponse {
    fn from(pair: TokenDetails) -> Self {
        let expires_in = (pair.access_expires_at - Utc::now()).num_seconds().max(0);
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".into(),
            expires_in,
            expires_at: pair.access_expires_at.timestamp(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub subject: SubjectResponse,
}

/// Public view of a subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub active: bool,
}

impl From<Subject> for SubjectResponse {
    fn from(s: Subject) -> Self {
        Self {
            id: s.id,
            username: s.username,
            email: s.email,
            full_name: s.full_name,
            active: s.active,
        }
    }
}

/// `GET /userinfo` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfoResponse {
    pub sub: String,
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    #[serde(default)]
    pub custom_attributes: Settings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PermissionCheckParams {
    pub resource: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionCheckResponse {
    pub subject_id: i64,
    pub resource: String,
    pub action: String,
    pub allowed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store_ok: bool,
}
