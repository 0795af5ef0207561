//! Redis-backed ephemeral store.
//!
//! Relies on Redis' single-key atomicity: `GETDEL` for take and
//! `SET NX PX` for claim. Requires Redis 6.2 or later.

use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tracing::error;

use super::{EphemeralStore, StoreError};

#[derive(Clone)]
pub struct RedisStore {
    _client: Client,
    conn_manager: ConnectionManager,
}

impl RedisStore {
    /// Connect and verify the server answers `PING`.
    pub async fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)
            .map_err(|e| StoreError::Config(format!("invalid Redis URL: {e}")))?;

        let conn_manager = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| StoreError::Backend(format!("Redis connection failed: {e}")))?;

        let mut conn = conn_manager.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(format!("Redis ping failed: {e}")))?;

        Ok(Self {
            _client: client,
            conn_manager,
        })
    }
}

/// TTL in whole milliseconds, never zero (Redis rejects `PX 0`).
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn backend(op: &str, key: &str, err: redis::RedisError) -> StoreError {
    error!(op, key, error = %err, "Redis command failed");
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl EphemeralStore for RedisStore {
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn_manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| backend("SET", key, e))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn_manager.clone();
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| backend("GET", key, e))
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn_manager.clone();
        redis::cmd("GETDEL")
            .arg(key)
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(|e| backend("GETDEL", key, e))
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn_manager.clone();
        let reply = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(|e| backend("SET NX", key, e))?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn_manager.clone();
        let removed = conn
            .del::<_, i64>(key)
            .await
            .map_err(|e| backend("DEL", key, e))?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn_manager.clone();
        conn.exists::<_, bool>(key)
            .await
            .map_err(|e| backend("EXISTS", key, e))
    }

    async fn health_check(&self) -> Result<(), String> {
        let mut conn = self.conn_manager.clone();
        match redis::cmd("PING").query_async::<String>(&mut conn).await {
            Ok(_) => Ok(()),
            Err(err) => Err(format!("Redis health check failed: {err}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_is_rounded_up_to_one_millisecond() {
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::from_secs(2)), 2000);
    }

    #[tokio::test]
    async fn invalid_url_is_a_config_error() {
        let result = RedisStore::new("not-a-redis-url").await;
        assert!(matches!(result, Err(StoreError::Config(_))));
    }

    /// Needs a live Redis at `REDIS_URL`.
    #[tokio::test]
    #[ignore]
    async fn take_and_claim_against_live_redis() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/".into());
        let store = RedisStore::new(&url).await.expect("connect to Redis");
        let key = format!("sso-test:{}", uuid::Uuid::new_v4());

        store
            .set(&key, "v".into(), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(store.take(&key).await.unwrap(), Some("v".to_string()));
        assert_eq!(store.take(&key).await.unwrap(), None);

        assert!(store
            .set_if_absent(&key, "a".into(), Duration::from_secs(30))
            .await
            .unwrap());
        assert!(!store
            .set_if_absent(&key, "b".into(), Duration::from_secs(30))
            .await
            .unwrap());
        assert!(store.delete(&key).await.unwrap());
    }
}
