/// Redis-backed key-value store.
///
/// - `SET key value NX EX ttl` for create-if-absent
/// - `GETDEL` for single-use consumption
/// - `ConnectionManager` for a shared, reconnecting connection

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use super::KeyValueStore;
use crate::configuration::RedisSettings;
use crate::error::AppError;

/// `Redis` key-value store. Cheap to clone; clones share one connection manager.
#[derive(Clone)]
pub struct RedisKeyValueStore {
    conn_manager: ConnectionManager,
    key_prefix: String,
}

impl std::fmt::Debug for RedisKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisKeyValueStore")
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl RedisKeyValueStore {
    /// Connect to `Redis`.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is malformed or the server is unreachable.
    pub async fn connect(settings: &RedisSettings) -> Result<Self, AppError> {
        let client = Client::open(settings.url.as_str())?;
        let conn_manager = ConnectionManager::new(client).await?;

        tracing::info!(key_prefix = %settings.key_prefix, "Connected to Redis");

        Ok(Self {
            conn_manager,
            key_prefix: settings.key_prefix.clone(),
        })
    }

    fn prefixed_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// Redis rejects a zero expiry, so round sub-second TTLs up.
    fn ttl_seconds(ttl: Duration) -> u64 {
        ttl.as_secs().max(1)
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn
            .set_ex(self.prefixed_key(key), value, Self::ttl_seconds(ttl))
            .await?;
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, AppError> {
        let mut conn = self.conn_manager.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.prefixed_key(key))
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(Self::ttl_seconds(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.conn_manager.clone();
        let value: Option<String> = conn.get(self.prefixed_key(key)).await?;
        Ok(value)
    }

    async fn take(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.conn_manager.clone();
        let value: Option<String> = conn.get_del(self.prefixed_key(key)).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn.del(self.prefixed_key(key)).await?;
        Ok(())
    }
}
