//! Token and ephemeral-record models.
//!
//! The ephemeral records are stored as JSON values in the ephemeral state
//! store; field names are part of the stored format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which half of a token pair a JWT is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims embedded in access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: user ID (standard JWT `sub` claim).
    pub sub: String,
    /// Numeric subject ID.
    pub user_id: i64,
    /// Unique token identifier (standard JWT `jti` claim).
    pub jti: String,
    /// Access or refresh.
    pub typ: TokenType,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

/// A freshly minted access/refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenDetails {
    pub access_token: String,
    pub refresh_token: String,
    pub access_uuid: String,
    pub refresh_uuid: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// A standalone access token, used for session logins that carry no refresh half.
#[derive(Debug, Clone)]
pub struct AccessTokenDetails {
    pub access_token: String,
    pub access_uuid: String,
    pub access_expires_at: DateTime<Utc>,
}

/// Data bound to an authorization code (`auth_code:<code>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthCodeRecord {
    pub user_id: i64,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

/// Data bound to an active refresh token (`refresh_token:<jti>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    pub user_id: i64,
    pub client_id: String,
    pub expires_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    /// Time left before the record expires, or `None` if already past.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        (self.expires_at - now).to_std().ok().filter(|d| !d.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn token_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(TokenType::Refresh).unwrap(),
            serde_json::json!("refresh")
        );
    }

    #[test]
    fn remaining_is_none_once_expired() {
        let now = Utc::now();
        let record = RefreshTokenRecord {
            user_id: 1,
            client_id: "app1".into(),
            expires_at: now - Duration::seconds(1),
        };
        assert!(record.remaining(now).is_none());
    }

    #[test]
    fn remaining_counts_down_to_expiry() {
        let now = Utc::now();
        let record = RefreshTokenRecord {
            user_id: 1,
            client_id: "app1".into(),
            expires_at: now + Duration::minutes(10),
        };
        assert_eq!(record.remaining(now), Some(std::time::Duration::from_secs(600)));
    }
}
