use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Pool, PoolConfig, Runtime};

use super::KeyValueStore;
use crate::configuration::RedisSettings;
use crate::error::StoreError;

/// Shared store on a Redis pool.
///
/// Every call is bounded by `timeout`; a call that overruns surfaces as
/// `StoreError::Timeout` instead of being dropped.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    timeout: Duration,
}

impl RedisStore {
    pub fn new(pool: Pool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub fn from_settings(settings: &RedisSettings) -> Result<Self, StoreError> {
        let timeout = Duration::from_millis(settings.timeout_ms);
        let pool = create_pool(settings)?;
        Ok(Self::new(pool, timeout))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Round-trip a PING so startup fails fast on a bad URL.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.bounded(async {
            let mut conn = self.connection().await?;
            let _pong: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(command_error)?;
            Ok(())
        })
        .await
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }
}

fn create_pool(settings: &RedisSettings) -> Result<Pool, StoreError> {
    let timeout = Duration::from_millis(settings.timeout_ms);
    let mut config = deadpool_redis::Config::from_url(&settings.url);
    let mut pool_config = PoolConfig::new(settings.pool_size);
    pool_config.timeouts.wait = Some(timeout);
    pool_config.timeouts.create = Some(timeout);
    pool_config.timeouts.recycle = Some(timeout);
    config.pool = Some(pool_config);

    config
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| StoreError::Connection(e.to_string()))
}

fn command_error(err: redis::RedisError) -> StoreError {
    StoreError::Command(err.to_string())
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let millis = ttl.as_millis() as u64;
        if millis == 0 {
            return Err(StoreError::Command(format!("refusing zero ttl for {}", key)));
        }

        self.bounded(async {
            let mut conn = self.connection().await?;
            conn.pset_ex::<_, _, ()>(key, value, millis)
                .await
                .map_err(command_error)
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.bounded(async {
            let mut conn = self.connection().await?;
            conn.get::<_, Option<String>>(key)
                .await
                .map_err(command_error)
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.bounded(async {
            let mut conn = self.connection().await?;
            conn.del::<_, u64>(key)
                .await
                .map(|removed| removed > 0)
                .map_err(command_error)
        })
        .await
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        // GETDEL is a single server-side step
        self.bounded(async {
            let mut conn = self.connection().await?;
            let value: Option<String> = redis::cmd("GETDEL")
                .arg(key)
                .query_async(&mut conn)
                .await
                .map_err(command_error)?;
            Ok(value)
        })
        .await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        self.bounded(async {
            let mut conn = self.connection().await?;
            let millis: i64 = redis::cmd("PTTL")
                .arg(key)
                .query_async(&mut conn)
                .await
                .map_err(command_error)?;

            // -2: no such key, -1: no expiry
            Ok(match millis {
                m if m >= 0 => Some(Duration::from_millis(m as u64)),
                -1 => Some(Duration::MAX),
                _ => None,
            })
        })
        .await
    }
}
