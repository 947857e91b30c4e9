/// JWT Claims structure
///
/// Payload of an access token: the caller's identity plus the registered
/// claims (RFC 7519) the validator enforces.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;
use crate::users::User;

/// JWT Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    pub username: String,
    pub role: String,
    /// Unique token identifier, the blacklist key
    pub jti: String,
    /// Issuer
    pub iss: String,
    /// Accepted recipients
    pub aud: Vec<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Build claims for `user`, valid from now for `expiry_seconds`
    pub fn new(user: &User, expiry_seconds: i64, issuer: String, audience: Vec<String>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role.clone(),
            jti: Uuid::new_v4().to_string(),
            iss: issuer,
            aud: audience,
            iat: now,
            nbf: now,
            exp: now + expiry_seconds,
        }
    }

    /// Extract user ID from claims
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::InvalidToken)
    }

    /// Time left until the token stops validating, zero once passed.
    ///
    /// `exp` is checked in whole seconds, so a token is still accepted
    /// during its `exp` second; the lifetime runs to the end of it.
    pub fn remaining_lifetime(&self) -> std::time::Duration {
        let remaining_ms = (self.exp + 1) * 1000 - chrono::Utc::now().timestamp_millis();
        if remaining_ms > 0 {
            std::time::Duration::from_millis(remaining_ms as u64)
        } else {
            std::time::Duration::ZERO
        }
    }

    pub fn identity(&self) -> Result<AuthenticatedUser, AuthError> {
        Ok(AuthenticatedUser {
            user_id: self.user_id()?,
            username: self.username.clone(),
            role: self.role.clone(),
        })
    }
}

/// Identity established by the authorization gate for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: String,
}
