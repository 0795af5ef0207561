//! Ephemeral state store contract.
//!
//! Holds authorization codes, active refresh-token records and the refresh
//! token blacklist. Every key carries a TTL. Per-key operations must be
//! linearizable; `take` and `set_if_absent` are the two primitives the
//! engine relies on to make code redemption and refresh rotation single-use.

pub mod memory;
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{info, warn};

/// Key prefix for authorization codes.
pub const AUTH_CODE_PREFIX: &str = "auth_code:";
/// Key prefix for active refresh-token records.
pub const REFRESH_TOKEN_PREFIX: &str = "refresh_token:";
/// Key prefix for revoked refresh tokens.
pub const REFRESH_TOKEN_BLACKLIST_PREFIX: &str = "blacklist:refresh_token:";

/// Value stored under blacklist keys.
pub const REVOKED_MARKER: &str = "revoked";

pub fn auth_code_key(code: &str) -> String {
    format!("{AUTH_CODE_PREFIX}{code}")
}

pub fn refresh_token_key(token_id: &str) -> String {
    format!("{REFRESH_TOKEN_PREFIX}{token_id}")
}

pub fn blacklist_key(token_id: &str) -> String {
    format!("{REFRESH_TOKEN_BLACKLIST_PREFIX}{token_id}")
}

/// Errors raised by ephemeral store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to encode or decode record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Key/value store with per-key expiry and atomic primitives.
#[async_trait]
pub trait EphemeralStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;

    /// Read the value under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Atomically read and delete the value under `key`.
    ///
    /// Of any number of concurrent callers, at most one receives the value.
    async fn take(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` only if `key` is absent. Returns whether this call stored it.
    async fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Delete `key`. Returns whether a live value was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Whether a live value exists under `key`.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Deep health check of the backend.
    async fn health_check(&self) -> Result<(), String>;
}

/// Serialize `value` as JSON and store it.
pub async fn put_json<T: Serialize + Sync>(
    store: &dyn EphemeralStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), StoreError> {
    let encoded = serde_json::to_string(value)?;
    store.set(key, encoded, ttl).await
}

/// Read and decode a JSON record.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn EphemeralStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Atomically take and decode a JSON record.
pub async fn take_json<T: DeserializeOwned>(
    store: &dyn EphemeralStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.take(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Build the ephemeral store: Redis when a URL is configured, memory otherwise.
pub async fn connect(redis_url: Option<&str>) -> Result<Arc<dyn EphemeralStore>, StoreError> {
    match redis_url {
        Some(url) if !url.trim().is_empty() => {
            let store = redis::RedisStore::new(url).await?;
            info!("using Redis ephemeral store");
            Ok(Arc::new(store))
        }
        _ => {
            warn!("no Redis URL configured, using in-process ephemeral store");
            let store = Arc::new(memory::MemoryStore::new());
            store.spawn_cleanup_task();
            Ok(store)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::RefreshTokenRecord;

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(auth_code_key("c1"), "auth_code:c1");
        assert_eq!(refresh_token_key("r1"), "refresh_token:r1");
        assert_eq!(blacklist_key("r1"), "blacklist:refresh_token:r1");
    }

    #[tokio::test]
    async fn json_helpers_roundtrip_through_store() {
        let store = memory::MemoryStore::new();
        let record = RefreshTokenRecord {
            user_id: 9,
            client_id: "app1".into(),
            expires_at: chrono::Utc::now(),
        };
        put_json(&store, "k", &record, Duration::from_secs(60))
            .await
            .unwrap();

        let read: Option<RefreshTokenRecord> = get_json(&store, "k").await.unwrap();
        assert_eq!(read.as_ref(), Some(&record));

        let taken: Option<RefreshTokenRecord> = take_json(&store, "k").await.unwrap();
        assert_eq!(taken, Some(record));
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn undecodable_record_is_a_serialization_error() {
        let store = memory::MemoryStore::new();
        store
            .set("k", "not json".into(), Duration::from_secs(60))
            .await
            .unwrap();
        let result: Result<Option<RefreshTokenRecord>, _> = get_json(&store, "k").await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[tokio::test]
    async fn connect_without_url_uses_memory() {
        let store = connect(None).await.unwrap();
        assert!(store.health_check().await.is_ok());
    }
}
