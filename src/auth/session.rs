/// Session lifecycle
///
/// Login issues an access/refresh pair, refresh rotates it, logout revokes
/// it. All shared state lives in the key-value store; this type only holds
/// handles, so clones are cheap and interchangeable.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::auth::blacklist::JwtBlacklistRepository;
use crate::auth::jwt::TokenIssuer;
use crate::auth::refresh_token::RefreshTokenRepository;
use crate::auth::validator::TokenValidator;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::store::KeyValueStore;
use crate::users::{User, UserRepository};

/// Credentials handed to the client after login or rotation
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct SessionManager {
    issuer: TokenIssuer,
    validator: TokenValidator,
    refresh_tokens: RefreshTokenRepository,
    blacklist: JwtBlacklistRepository,
    users: Arc<dyn UserRepository>,
    refresh_ttl: Duration,
}

impl SessionManager {
    pub fn new(
        config: &JwtSettings,
        store: Arc<dyn KeyValueStore>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        let blacklist = JwtBlacklistRepository::new(store.clone());
        Self {
            issuer: TokenIssuer::new(config),
            validator: TokenValidator::new(config, blacklist.clone()),
            refresh_tokens: RefreshTokenRepository::new(store),
            blacklist,
            users,
            refresh_ttl: Duration::from_secs(config.refresh_token_expiry.max(0) as u64),
        }
    }

    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    /// Issue a fresh pair for an authenticated user.
    ///
    /// The refresh token is persisted before it is returned, so a pair that
    /// reaches the client is always redeemable.
    pub async fn login(&self, user: &User) -> Result<TokenPair, AppError> {
        let access_token = self.issuer.issue_access_token(user)?;
        let refresh_token = self.issuer.issue_refresh_token();

        self.refresh_tokens
            .store_refresh_token(user.id, &refresh_token, self.refresh_ttl)
            .await?;

        tracing::info!(user_id = %user.id, "Issued token pair");

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.issuer.access_token_expiry(),
        })
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// The old token is consumed with a single atomic take, so of any number
    /// of concurrent rotations with the same token at most one succeeds.
    /// Once consumed it stays consumed even if issuing the new pair fails.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        if refresh_token.is_empty() {
            return Err(AuthError::InvalidRefreshToken.into());
        }

        let owner = match self.refresh_tokens.consume_refresh_token(refresh_token).await {
            Ok(Some(owner)) => owner,
            Ok(None) => {
                tracing::debug!("Refresh token unknown, expired or already used");
                return Err(AuthError::InvalidRefreshToken.into());
            }
            Err(e) => {
                tracing::error!(error = %e, "Refresh token lookup failed");
                return Err(AuthError::InvalidRefreshToken.into());
            }
        };

        let user_id = Uuid::parse_str(&owner)
            .map_err(|_| AppError::Internal(format!("corrupt refresh token owner: {}", owner)))?;

        let user = match self.users.get_user_by_id(user_id).await? {
            Some(user) => user,
            None => {
                tracing::warn!(user_id = %user_id, "Refresh token owner no longer exists");
                return Err(AuthError::InvalidRefreshToken.into());
            }
        };

        let pair = self.login(&user).await?;
        tracing::info!(user_id = %user.id, "Rotated refresh token");
        Ok(pair)
    }

    /// Blacklist an access token for the rest of its lifetime.
    ///
    /// The signature must verify, but the token may already be past its
    /// validity window; an expired token is reported as such and nothing is
    /// written.
    pub async fn revoke(&self, access_token: &str) -> Result<(), AppError> {
        let claims = self.validator.decode_for_revocation(access_token)?;

        if claims.jti.is_empty() {
            return Err(AuthError::MissingJti.into());
        }

        let remaining = claims.remaining_lifetime();
        if remaining.is_zero() {
            return Err(AuthError::ExpiredToken.into());
        }

        self.blacklist.add_to_blacklist(&claims.jti, remaining).await?;

        tracing::info!(
            jti = %claims.jti,
            sub = %claims.sub,
            ttl_secs = remaining.as_secs(),
            "Access token revoked"
        );
        Ok(())
    }

    /// Revoke the access token, then the refresh token if one was given.
    ///
    /// Only the blacklist write decides the outcome; refresh token removal is
    /// best-effort.
    pub async fn logout(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), AppError> {
        self.revoke(access_token).await?;

        if let Some(token) = refresh_token.filter(|t| !t.is_empty()) {
            match self.refresh_tokens.revoke_refresh_token(token).await {
                Ok(true) => tracing::debug!("Refresh token revoked on logout"),
                Ok(false) => tracing::debug!("Refresh token on logout was already gone"),
                Err(e) => tracing::warn!(error = %e, "Failed to revoke refresh token on logout"),
            }
        }

        Ok(())
    }
}
