//! Authorization-code grant and refresh-token rotation.
//!
//! The engine holds no mutable state of its own. Single-use codes and
//! single-rotation refresh tokens rest entirely on two store primitives:
//! `take` consumes a code in one step, and `set_if_absent` on the blacklist
//! key lets exactly one caller rotate a given refresh token.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::AuthError;
use super::jwt::{AUTH_CODE_LENGTH, TokenCodec, random_opaque_string};
use super::password::{MIN_PASSWORD_LEN, hash_password, verify_password};
use crate::config::AuthConfig;
use crate::credentials::CredentialStore;
use crate::models::auth::{
    AuthCodeRecord, RefreshTokenRecord, TokenClaims, TokenDetails, TokenType,
};
use crate::models::credentials::{Client, NewSubject, Subject};
use crate::store::{
    self, EphemeralStore, REVOKED_MARKER, auth_code_key, blacklist_key, refresh_token_key,
};

/// Attempts at drawing an unused authorization code before giving up.
const CODE_GENERATION_ATTEMPTS: usize = 3;

/// A freshly issued authorization code and the scopes it carries.
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub code: String,
    pub scopes: Vec<String>,
}

/// Input for self-service registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

/// Split a scope parameter on whitespace and commas.
pub fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Orchestrates code issuance, code exchange, refresh rotation and revocation.
#[derive(Clone)]
pub struct AuthorizationEngine {
    credentials: Arc<dyn CredentialStore>,
    store: Arc<dyn EphemeralStore>,
    codec: TokenCodec,
    config: AuthConfig,
}

impl AuthorizationEngine {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        store: Arc<dyn EphemeralStore>,
        config: AuthConfig,
    ) -> Self {
        Self {
            credentials,
            store,
            codec: TokenCodec::from_config(&config),
            config,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    pub fn store(&self) -> &Arc<dyn EphemeralStore> {
        &self.store
    }

    /// Run a store call under the configured deadline.
    async fn bounded<T, E, F>(&self, op: &'static str, fut: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<AuthError>,
    {
        match tokio::time::timeout(self.config.store_timeout, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => {
                warn!(op, timeout = ?self.config.store_timeout, "store call timed out");
                Err(AuthError::BackendUnavailable(format!("{op} timed out")))
            }
        }
    }

    fn refresh_record_ttl(&self) -> Result<Duration, AuthError> {
        self.config
            .refresh_token_ttl()
            .to_std()
            .map_err(|_| AuthError::Internal("refresh token lifetime is negative".into()))
    }

    /// Load a client and check it is active; when `secret` is given it must match.
    pub async fn validate_client_credentials(
        &self,
        client_id: &str,
        secret: Option<&str>,
    ) -> Result<Client, AuthError> {
        let client = self
            .bounded("find_client", self.credentials.find_client(client_id))
            .await?
            .ok_or_else(|| {
                debug!(client_id, "unknown client");
                AuthError::InvalidClient
            })?;

        if let Some(secret) = secret
            && !secrets_match(secret, &client.client_secret)
        {
            debug!(client_id, "client secret mismatch");
            return Err(AuthError::InvalidClient);
        }
        if !client.active {
            debug!(client_id, "client is disabled");
            return Err(AuthError::InvalidClient);
        }
        Ok(client)
    }

    /// Look up a subject's profile.
    pub async fn subject(&self, subject_id: i64) -> Result<Option<Subject>, AuthError> {
        self.bounded("find_subject", self.credentials.find_subject(subject_id))
            .await
    }

    async fn active_subject(&self, subject_id: i64) -> Result<Subject, AuthError> {
        let subject = self
            .bounded("find_subject", self.credentials.find_subject(subject_id))
            .await?;
        match subject {
            Some(s) if s.active => Ok(s),
            Some(_) => {
                debug!(subject_id, "subject is disabled");
                Err(AuthError::SubjectDisabled)
            }
            None => {
                debug!(subject_id, "subject not found");
                Err(AuthError::SubjectDisabled)
            }
        }
    }

    /// Issue a single-use authorization code for an authenticated subject.
    pub async fn authorize_subject(
        &self,
        subject_id: i64,
        client_id: &str,
        requested_scopes: &[String],
    ) -> Result<IssuedCode, AuthError> {
        if requested_scopes.is_empty() {
            return Err(AuthError::EmptyScopeRequest);
        }
        let client = self.validate_client_credentials(client_id, None).await?;
        self.active_subject(subject_id).await?;

        let scopes = client.filter_scopes(requested_scopes);
        if scopes.is_empty() {
            debug!(client_id, ?requested_scopes, "no requested scope is allowed");
            return Err(AuthError::NoValidScopes);
        }

        let ttl = self.config.auth_code_ttl();
        let lifetime = chrono::Duration::from_std(ttl)
            .map_err(|_| AuthError::Internal("authorization code lifetime out of range".into()))?;
        let record = AuthCodeRecord {
            user_id: subject_id,
            client_id: client.client_id.clone(),
            scopes: scopes.clone(),
            expires_at: Utc::now() + lifetime,
        };
        let encoded = serde_json::to_string(&record)
            .map_err(|e| AuthError::Internal(format!("record encoding: {e}")))?;

        for _ in 0..CODE_GENERATION_ATTEMPTS {
            let code = random_opaque_string(AUTH_CODE_LENGTH);
            let stored = self
                .bounded(
                    "store_auth_code",
                    self.store
                        .set_if_absent(&auth_code_key(&code), encoded.clone(), ttl),
                )
                .await?;
            if stored {
                info!(client_id, subject_id, scopes = ?scopes, "issued authorization code");
                return Ok(IssuedCode { code, scopes });
            }
        }
        Err(AuthError::Internal(
            "could not allocate a unique authorization code".into(),
        ))
    }

    /// Redeem an authorization code for a token pair.
    ///
    /// The code is consumed as soon as it is read, whatever happens next.
    pub async fn exchange_code_for_tokens(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
    ) -> Result<TokenDetails, AuthError> {
        let client = self.validate_client_credentials(client_id, None).await?;
        if !client.has_redirect_uri(redirect_uri) {
            debug!(client_id, "redirect URI is not registered");
            return Err(AuthError::InvalidRedirectUri);
        }

        let record: AuthCodeRecord = self
            .bounded(
                "take_auth_code",
                store::take_json(self.store.as_ref(), &auth_code_key(code)),
            )
            .await?
            .ok_or(AuthError::InvalidOrExpiredCode)?;

        if record.client_id != client.client_id {
            warn!(
                client_id,
                code_client_id = %record.client_id,
                "authorization code presented by another client"
            );
            return Err(AuthError::ClientMismatch);
        }
        if record.expires_at <= Utc::now() {
            return Err(AuthError::InvalidOrExpiredCode);
        }
        self.active_subject(record.user_id).await?;

        let pair = self.codec.issue(record.user_id)?;
        self.persist_refresh_record(&pair, record.user_id, &client.client_id)
            .await?;

        info!(client_id, subject_id = record.user_id, "exchanged authorization code");
        Ok(pair)
    }

    async fn persist_refresh_record(
        &self,
        pair: &TokenDetails,
        subject_id: i64,
        client_id: &str,
    ) -> Result<(), AuthError> {
        let record = RefreshTokenRecord {
            user_id: subject_id,
            client_id: client_id.to_string(),
            expires_at: pair.refresh_expires_at,
        };
        let ttl = self.refresh_record_ttl()?;
        self.bounded(
            "store_refresh_token",
            store::put_json(
                self.store.as_ref(),
                &refresh_token_key(&pair.refresh_uuid),
                &record,
                ttl,
            ),
        )
        .await
    }

    /// Verify a refresh token's signature and type, returning its claims.
    fn refresh_claims(&self, refresh_token: &str) -> Result<TokenClaims, AuthError> {
        self.codec
            .verify_kind(refresh_token, TokenType::Refresh)
            .map_err(|e| match e {
                AuthError::InvalidSignatureMethod | AuthError::ExpiredOrMalformed => {
                    AuthError::InvalidOrExpiredToken
                }
                other => other,
            })
    }

    /// Rotate a refresh token: blacklist the old one and issue a new pair.
    pub async fn refresh_tokens(
        &self,
        refresh_token: &str,
        client_id: &str,
    ) -> Result<TokenDetails, AuthError> {
        let client = self.validate_client_credentials(client_id, None).await?;
        let claims = self.refresh_claims(refresh_token)?;
        let old_id = claims.jti.as_str();
        let revoked_key = blacklist_key(old_id);

        if self
            .bounded("check_blacklist", self.store.exists(&revoked_key))
            .await?
        {
            warn!(client_id, jti = %old_id, "revoked refresh token presented");
            return Err(AuthError::TokenRevoked);
        }

        let record: RefreshTokenRecord = self
            .bounded(
                "load_refresh_token",
                store::get_json(self.store.as_ref(), &refresh_token_key(old_id)),
            )
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        if record.client_id != client.client_id {
            warn!(
                client_id,
                token_client_id = %record.client_id,
                "refresh token presented by another client"
            );
            return Err(AuthError::ClientMismatch);
        }
        if record.user_id != claims.user_id {
            return Err(AuthError::InvalidOrExpiredToken);
        }
        let remaining = record
            .remaining(Utc::now())
            .ok_or(AuthError::InvalidOrExpiredToken)?;
        self.active_subject(record.user_id).await?;

        let pair = self.codec.issue(record.user_id)?;

        let claimed = self
            .bounded(
                "blacklist_refresh_token",
                self.store
                    .set_if_absent(&revoked_key, REVOKED_MARKER.to_string(), remaining),
            )
            .await?;
        if !claimed {
            warn!(client_id, jti = %old_id, "refresh token already rotated");
            return Err(AuthError::TokenRevoked);
        }

        if let Err(e) = self
            .persist_refresh_record(&pair, record.user_id, &client.client_id)
            .await
        {
            warn!(jti = %old_id, error = %e, "releasing rotation claim after failed write");
            if let Err(release) = self
                .bounded("release_blacklist", self.store.delete(&revoked_key))
                .await
            {
                warn!(jti = %old_id, error = %release, "could not release rotation claim");
            }
            return Err(e);
        }

        info!(client_id, subject_id = record.user_id, "rotated refresh token");
        debug!(old_jti = %old_id, new_jti = %pair.refresh_uuid, "refresh token lineage");
        Ok(pair)
    }

    /// Revoke a refresh token for the rest of its lifetime.
    ///
    /// Unknown, expired or already revoked tokens are accepted silently.
    pub async fn revoke_refresh_token(
        &self,
        refresh_token: &str,
        client_id: &str,
    ) -> Result<(), AuthError> {
        let client = self.validate_client_credentials(client_id, None).await?;
        let Ok(claims) = self.refresh_claims(refresh_token) else {
            debug!(client_id, "ignoring revocation of an unverifiable token");
            return Ok(());
        };

        let record: Option<RefreshTokenRecord> = self
            .bounded(
                "load_refresh_token",
                store::get_json(self.store.as_ref(), &refresh_token_key(&claims.jti)),
            )
            .await?;
        let Some(record) = record else {
            return Ok(());
        };
        if record.client_id != client.client_id {
            return Err(AuthError::ClientMismatch);
        }
        let Some(remaining) = record.remaining(Utc::now()) else {
            return Ok(());
        };

        self.bounded(
            "blacklist_refresh_token",
            self.store.set_if_absent(
                &blacklist_key(&claims.jti),
                REVOKED_MARKER.to_string(),
                remaining,
            ),
        )
        .await?;
        info!(client_id, subject_id = record.user_id, "revoked refresh token");
        Ok(())
    }

    /// Verify a bearer access token. Access tokens are stateless.
    pub fn validate_access_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
        self.codec.verify_kind(token, TokenType::Access)
    }

    /// Check a login (username or email) and password.
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<Subject, AuthError> {
        let found = self
            .bounded(
                "find_subject_by_login",
                self.credentials.find_subject_by_login(login),
            )
            .await?;
        let Some(found) = found else {
            debug!("login for unknown subject");
            return Err(AuthError::CredentialError);
        };

        let password = password.to_string();
        let hash = found.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("password check task: {e}")))?
            .unwrap_or(false);
        if !valid {
            debug!(subject_id = found.subject.id, "wrong password");
            return Err(AuthError::CredentialError);
        }
        if !found.subject.active {
            return Err(AuthError::SubjectDisabled);
        }
        info!(subject_id = found.subject.id, "subject authenticated");
        Ok(found.subject)
    }

    /// Create a new active subject.
    pub async fn register(&self, registration: Registration) -> Result<Subject, AuthError> {
        let Registration {
            username,
            email,
            password,
            full_name,
        } = registration;
        let username = username.trim().to_string();
        let email = email.trim().to_string();

        if username.is_empty() || username.len() > 50 {
            return Err(AuthError::ValidationError(
                "Username must be 1 to 50 characters".into(),
            ));
        }
        if !email.contains('@') || email.len() > 100 {
            return Err(AuthError::ValidationError("Invalid email address".into()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::ValidationError(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        if self
            .bounded(
                "username_or_email_taken",
                self.credentials.username_or_email_taken(&username, &email),
            )
            .await?
        {
            return Err(AuthError::ValidationError(
                "Username or email already registered".into(),
            ));
        }

        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("password hash task: {e}")))??;

        let subject = self
            .bounded(
                "create_subject",
                self.credentials.create_subject(NewSubject {
                    username,
                    email,
                    full_name: full_name.filter(|n| !n.trim().is_empty()),
                    password_hash,
                }),
            )
            .await?;
        info!(subject_id = subject.id, "registered subject");
        Ok(subject)
    }
}

/// Compare secrets without an early exit on the first differing byte.
fn secrets_match(presented: &str, expected: &str) -> bool {
    let (a, b) = (presented.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
