//! JWT token generation and verification.
//!
//! Access and refresh tokens are HMAC-signed JWTs carrying the subject id,
//! a UUID `jti` and the token type. Authorization codes are opaque random
//! strings drawn from the thread-local CSPRNG.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::debug;
use uuid::Uuid;

use super::AuthError;
use crate::config::AuthConfig;
use crate::models::auth::{AccessTokenDetails, TokenClaims, TokenDetails, TokenType};

/// Algorithm used when signing.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Algorithms accepted when verifying. Anything outside the HMAC family is refused.
const HMAC_ALGORITHMS: [(&str, Algorithm); 3] = [
    ("HS256", Algorithm::HS256),
    ("HS384", Algorithm::HS384),
    ("HS512", Algorithm::HS512),
];

/// Signs and verifies token pairs with a shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    has_secret: bool,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            has_secret: !secret.is_empty(),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.jwt_secret.as_bytes(),
            config.access_token_ttl(),
            config.refresh_token_ttl(),
        )
    }

    /// Lifetime of issued access tokens.
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Lifetime of issued refresh tokens.
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Mint an access/refresh pair for `subject_id`.
    pub fn issue(&self, subject_id: i64) -> Result<TokenDetails, AuthError> {
        self.issue_at(subject_id, Utc::now())
    }

    /// Mint a pair as if the current time were `now`.
    pub fn issue_at(&self, subject_id: i64, now: DateTime<Utc>) -> Result<TokenDetails, AuthError> {
        let now = now.trunc_subsecs(0);
        let (access_token, access_uuid, access_expires_at) =
            self.mint(subject_id, TokenType::Access, now, self.access_ttl)?;
        let (refresh_token, refresh_uuid, refresh_expires_at) =
            self.mint(subject_id, TokenType::Refresh, now, self.refresh_ttl)?;

        debug!(subject_id, access_jti = %access_uuid, refresh_jti = %refresh_uuid, "issued token pair");

        Ok(TokenDetails {
            access_token,
            refresh_token,
            access_uuid,
            refresh_uuid,
            access_expires_at,
            refresh_expires_at,
        })
    }

    /// Mint an access token alone for `subject_id`.
    pub fn issue_access(&self, subject_id: i64) -> Result<AccessTokenDetails, AuthError> {
        let now = Utc::now().trunc_subsecs(0);
        let (access_token, access_uuid, access_expires_at) =
            self.mint(subject_id, TokenType::Access, now, self.access_ttl)?;

        debug!(subject_id, access_jti = %access_uuid, "issued access token");

        Ok(AccessTokenDetails {
            access_token,
            access_uuid,
            access_expires_at,
        })
    }

    fn mint(
        &self,
        subject_id: i64,
        typ: TokenType,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<(String, String, DateTime<Utc>), AuthError> {
        if !self.has_secret {
            return Err(AuthError::SigningError("signing secret is empty".into()));
        }
        let jti = Uuid::new_v4().to_string();
        let expires_at = now + ttl;
        let token = self.sign(&TokenClaims {
            sub: subject_id.to_string(),
            user_id: subject_id,
            jti: jti.clone(),
            typ,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        })?;
        Ok((token, jti, expires_at))
    }

    fn sign(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        encode(
            &Header::new(SIGNING_ALGORITHM),
            claims,
            &self.encoding_key,
        )
        .map_err(|e| AuthError::SigningError(format!("jwt encode: {e}")))
    }

    /// Verify signature and expiry, returning the claims.
    ///
    /// A token declaring a non-HMAC `alg` fails with `InvalidSignatureMethod`
    /// before any signature check is attempted.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let algorithm = declared_algorithm(token)?;

        let mut validation = Validation::new(algorithm);
        validation.algorithms = HMAC_ALGORITHMS.iter().map(|(_, a)| *a).collect();
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidAlgorithm => AuthError::InvalidSignatureMethod,
                _ => AuthError::ExpiredOrMalformed,
            })
    }

    /// Verify a token and require it to be of the given type.
    pub fn verify_kind(&self, token: &str, kind: TokenType) -> Result<TokenClaims, AuthError> {
        let claims = self.verify(token)?;
        if claims.typ != kind {
            return Err(AuthError::ExpiredOrMalformed);
        }
        Ok(claims)
    }
}

/// Read the `alg` header without trusting anything else in the token.
fn declared_algorithm(token: &str) -> Result<Algorithm, AuthError> {
    let header_segment = token.split('.').next().ok_or(AuthError::ExpiredOrMalformed)?;
    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_segment)
        .map_err(|_| AuthError::ExpiredOrMalformed)?;
    let header: serde_json::Value =
        serde_json::from_slice(&header_bytes).map_err(|_| AuthError::ExpiredOrMalformed)?;
    let alg = header
        .get("alg")
        .and_then(|v| v.as_str())
        .ok_or(AuthError::ExpiredOrMalformed)?;

    HMAC_ALGORITHMS
        .iter()
        .find(|(name, _)| *name == alg)
        .map(|(_, a)| *a)
        .ok_or(AuthError::InvalidSignatureMethod)
}

/// Length of generated authorization codes.
pub const AUTH_CODE_LENGTH: usize = 32;

/// Generate a random alphanumeric string from the thread-local CSPRNG.
pub fn random_opaque_string(length: usize) -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
