//! Token lifecycle configuration.

use std::path::PathBuf;
use std::time::Duration;

use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{info, warn};

/// Default access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 15;

/// Default refresh token lifetime: 7 days.
pub const DEFAULT_REFRESH_TOKEN_TTL_MINUTES: i64 = 7 * 24 * 60;

/// Default authorization code lifetime: 10 minutes.
pub const DEFAULT_AUTH_CODE_TTL_SECS: u64 = 600;

/// Default deadline for a single store round trip.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings consumed by the token codec and the authorization engine.
#[derive(Clone)]
pub struct AuthConfig {
    /// Access token lifetime (minutes).
    pub access_token_ttl_minutes: i64,
    /// Refresh token lifetime (minutes).
    pub refresh_token_ttl_minutes: i64,
    /// Authorization code lifetime (seconds).
    pub auth_code_ttl_secs: u64,
    /// HMAC signing secret.
    pub jwt_secret: String,
    /// Deadline applied to every store call.
    pub store_timeout: Duration,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_token_ttl_minutes", &self.access_token_ttl_minutes)
            .field("refresh_token_ttl_minutes", &self.refresh_token_ttl_minutes)
            .field("auth_code_ttl_secs", &self.auth_code_ttl_secs)
            .field("jwt_secret", &"<redacted>")
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}

impl AuthConfig {
    /// Config with default lifetimes and the given secret.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            access_token_ttl_minutes: DEFAULT_ACCESS_TOKEN_TTL_MINUTES,
            refresh_token_ttl_minutes: DEFAULT_REFRESH_TOKEN_TTL_MINUTES,
            auth_code_ttl_secs: DEFAULT_AUTH_CODE_TTL_SECS,
            jwt_secret: jwt_secret.into(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable               | Default                            |
    /// |------------------------|------------------------------------|
    /// | `ACCESS_TOKEN_EXPIRY`  | `15` (minutes)                     |
    /// | `REFRESH_TOKEN_EXPIRY` | `10080` (minutes)                  |
    /// | `AUTH_CODE_EXPIRY`     | `600` (seconds)                    |
    /// | `STORE_TIMEOUT_MS`     | `5000`                             |
    /// | `JWT_SECRET` / `AUTH_SECRET` | generated & persisted to file |
    pub fn from_env() -> Self {
        Self {
            access_token_ttl_minutes: env_or("ACCESS_TOKEN_EXPIRY", DEFAULT_ACCESS_TOKEN_TTL_MINUTES),
            refresh_token_ttl_minutes: env_or(
                "REFRESH_TOKEN_EXPIRY",
                DEFAULT_REFRESH_TOKEN_TTL_MINUTES,
            ),
            auth_code_ttl_secs: env_or("AUTH_CODE_EXPIRY", DEFAULT_AUTH_CODE_TTL_SECS),
            jwt_secret: resolve_jwt_secret(),
            store_timeout: Duration::from_millis(env_or(
                "STORE_TIMEOUT_MS",
                DEFAULT_STORE_TIMEOUT.as_millis() as u64,
            )),
        }
    }

    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_token_ttl_minutes)
    }

    pub fn refresh_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.refresh_token_ttl_minutes)
    }

    pub fn auth_code_ttl(&self) -> Duration {
        Duration::from_secs(self.auth_code_ttl_secs)
    }
}

/// Parse an env var, falling back to `default` when unset or unparseable.
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(key, value = %raw, "ignoring unparseable setting");
                default
            }
        },
        _ => default,
    }
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("AUTH_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    load_or_create_secret(&jwt_secret_path())
}

/// Read a persisted secret, generating and writing a new one if absent.
pub fn load_or_create_secret(secret_path: &std::path::Path) -> String {
    if let Ok(existing) = std::fs::read_to_string(secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret = generate_secret();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = std::fs::write(secret_path, &secret) {
        warn!(path = %secret_path.display(), error = %e, "could not persist JWT secret");
    } else {
        info!(path = %secret_path.display(), "generated new JWT secret");
    }
    secret
}

/// Generate a 64-character signing secret.
pub fn generate_secret() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sso")
        .join("jwt-secret")
}
