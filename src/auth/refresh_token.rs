/// Refresh Token Management
///
/// Refresh tokens are:
/// - Random UUIDv4 strings with no embedded claims
/// - Stored under a SHA-256 digest of the token, never in plaintext
/// - Bound to the owning user id with a TTL
/// - Single-use: rotation atomically consumes the entry

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::KeyValueStore;

/// Generate a new refresh token
///
/// The token is returned in plaintext (this is what the client stores).
pub fn generate_refresh_token() -> String {
    Uuid::new_v4().to_string()
}

/// Hash a refresh token using SHA-256
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn refresh_token_key(token: &str) -> String {
    format!("refresh_token:{}", hash_token(token))
}

/// Registry of live refresh tokens, `refresh_token:<digest>` → user id
#[derive(Clone)]
pub struct RefreshTokenRepository {
    store: Arc<dyn KeyValueStore>,
}

impl RefreshTokenRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn store_refresh_token(
        &self,
        user_id: Uuid,
        token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.store
            .set(&refresh_token_key(token), &user_id.to_string(), ttl)
            .await
    }

    /// Atomically look up and delete `token`, returning the owning user id.
    ///
    /// `None` when the token is unknown, already consumed or expired.
    pub async fn consume_refresh_token(&self, token: &str) -> Result<Option<String>, StoreError> {
        self.store.take(&refresh_token_key(token)).await
    }

    pub async fn revoke_refresh_token(&self, token: &str) -> Result<bool, StoreError> {
        self.store.delete(&refresh_token_key(token)).await
    }

    pub async fn remaining_ttl(&self, token: &str) -> Result<Option<Duration>, StoreError> {
        self.store.ttl(&refresh_token_key(token)).await
    }
}
