/// Revocation / session store
///
/// A TTL-aware key-value capability backing the access-token blacklist and
/// the refresh-token registry. The token core holds no in-process locks and
/// relies on the per-key atomicity each backend provides.

mod memory;
mod redis;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Write `value` under `key`, expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Returns whether a live entry was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Atomically read and remove `key`.
    ///
    /// Of any number of concurrent callers for the same key, at most one
    /// observes the value.
    async fn take(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Remaining lifetime of `key`, `None` when absent.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;
}

/// A store whose every call fails, for exercising outage paths.
#[cfg(test)]
pub(crate) struct UnavailableStore;

#[cfg(test)]
#[async_trait]
impl KeyValueStore for UnavailableStore {
    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::Connection("connection refused".to_string()))
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Connection("connection refused".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<bool, StoreError> {
        Err(StoreError::Connection("connection refused".to_string()))
    }

    async fn take(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Timeout(Duration::from_millis(500)))
    }

    async fn ttl(&self, _key: &str) -> Result<Option<Duration>, StoreError> {
        Err(StoreError::Connection("connection refused".to_string()))
    }
}
