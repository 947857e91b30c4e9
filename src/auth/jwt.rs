/// Access token issuance
///
/// Signs short-lived HS256 access tokens and hands out opaque refresh tokens.

use jsonwebtoken::{encode, EncodingKey, Header};

use crate::auth::claims::Claims;
use crate::auth::refresh_token::generate_refresh_token;
use crate::configuration::JwtSettings;
use crate::error::AppError;
use crate::users::User;

#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    issuer: String,
    audience: Vec<String>,
    access_token_expiry: i64,
}

impl TokenIssuer {
    pub fn new(config: &JwtSettings) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audiences(),
            access_token_expiry: config.access_token_expiry,
        }
    }

    /// Access token lifetime in seconds
    pub fn access_token_expiry(&self) -> i64 {
        self.access_token_expiry
    }

    /// Generate a new access token for a user
    ///
    /// # Errors
    /// Returns `AppError::Signing` if the token cannot be encoded
    pub fn issue_access_token(&self, user: &User) -> Result<String, AppError> {
        let claims = Claims::new(
            user,
            self.access_token_expiry,
            self.issuer.clone(),
            self.audience.clone(),
        );

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Signing(e.to_string()))
    }

    /// Generate a new opaque refresh token.
    ///
    /// Persisting it is the caller's job.
    pub fn issue_refresh_token(&self) -> String {
        generate_refresh_token()
    }
}
