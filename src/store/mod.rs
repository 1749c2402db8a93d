/// TTL-capable key-value store abstraction.
///
/// The refresh-token store sits on top of this trait, so it can run against
/// Redis in production and against the in-memory map in tests. Each backend
/// enforces expiry itself; an expired key is indistinguishable from a
/// missing one.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::AppError;

mod memory;
mod redis;

pub use self::memory::InMemoryKeyValueStore;
pub use self::redis::RedisKeyValueStore;

#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError>;

    /// Store `value` only if `key` is absent. Returns `true` if it was written.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, AppError>;

    /// Get a value. `None` if the key does not exist or has expired.
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Atomically get and delete a value.
    ///
    /// Of several concurrent callers for the same key at most one sees `Some`.
    async fn take(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}
