/// Access-token blacklist
///
/// A negative cache of revoked `jti`s. Each entry lives exactly as long as
/// the token it revokes could still have been used.

use std::sync::Arc;
use std::time::Duration;

use crate::error::StoreError;
use crate::store::KeyValueStore;

const BLACKLISTED: &str = "blacklisted";

fn blacklist_key(jti: &str) -> String {
    format!("jwt:blacklist:{}", jti)
}

#[derive(Clone)]
pub struct JwtBlacklistRepository {
    store: Arc<dyn KeyValueStore>,
}

impl JwtBlacklistRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// `ttl` must be the token's remaining lifetime
    pub async fn add_to_blacklist(&self, jti: &str, ttl: Duration) -> Result<(), StoreError> {
        self.store.set(&blacklist_key(jti), BLACKLISTED, ttl).await
    }

    pub async fn is_blacklisted(&self, jti: &str) -> Result<bool, StoreError> {
        Ok(self.store.get(&blacklist_key(jti)).await?.is_some())
    }

    pub async fn remaining_ttl(&self, jti: &str) -> Result<Option<Duration>, StoreError> {
        self.store.ttl(&blacklist_key(jti)).await
    }
}
