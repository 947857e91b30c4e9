/// Access token validation
///
/// Verifies signature, algorithm, time window, issuer and audience, then
/// consults the blacklist. Token problems come back as a `Rejected`
/// outcome; a blacklist lookup that cannot be answered comes back as a
/// `StoreError` so callers can tell a bad token from a broken store.

use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::auth::blacklist::JwtBlacklistRepository;
use crate::auth::claims::{AuthenticatedUser, Claims};
use crate::configuration::JwtSettings;
use crate::error::{AuthError, StoreError};

/// Why a token was turned away, with the decoder error kept for diagnostics
#[derive(Debug)]
pub struct Rejection {
    pub reason: AuthError,
    pub source: Option<JwtError>,
}

impl Rejection {
    fn new(reason: AuthError) -> Self {
        Self {
            reason,
            source: None,
        }
    }

    fn from_decode(err: JwtError) -> Self {
        let reason = match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => AuthError::InvalidTokenFormat,
            _ => AuthError::InvalidToken,
        };
        Self {
            reason,
            source: Some(err),
        }
    }

    /// Short reason safe to show to the client
    pub fn message(&self) -> String {
        self.reason.to_string()
    }
}

#[derive(Debug)]
pub enum TokenValidation {
    Valid(AuthenticatedUser),
    Rejected(Rejection),
}

impl TokenValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, TokenValidation::Valid(_))
    }
}

#[derive(Clone)]
pub struct TokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
    blacklist: JwtBlacklistRepository,
}

impl TokenValidator {
    pub fn new(config: &JwtSettings, blacklist: JwtBlacklistRepository) -> Self {
        // Only HS256 is accepted; any other `alg` header fails decoding
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);

        let audiences = config.audiences();
        if audiences.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&audiences);
        }

        Self {
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            blacklist,
        }
    }

    /// Validate an access token and resolve the identity it carries.
    ///
    /// # Errors
    /// Returns `StoreError` only when the blacklist could not be consulted.
    pub async fn validate(&self, token: &str) -> Result<TokenValidation, StoreError> {
        let claims = match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::debug!(error = %e, "JWT validation error");
                return Ok(TokenValidation::Rejected(Rejection::from_decode(e)));
            }
        };

        if !claims.jti.is_empty() && self.blacklist.is_blacklisted(&claims.jti).await? {
            tracing::info!(jti = %claims.jti, "Rejected revoked access token");
            return Ok(TokenValidation::Rejected(Rejection::new(AuthError::TokenRevoked)));
        }

        match claims.identity() {
            Ok(identity) => Ok(TokenValidation::Valid(identity)),
            Err(reason) => Ok(TokenValidation::Rejected(Rejection::new(reason))),
        }
    }

    /// Decode a token for revocation.
    ///
    /// Signature, algorithm and issuer are still verified, but an expired or
    /// not-yet-valid window is tolerated so the caller can compute what is
    /// left of the token's lifetime.
    pub fn decode_for_revocation(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = self.validation.clone();
        validation.validate_exp = false;
        validation.validate_nbf = false;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::warn!(error = %e, "Refusing to revoke unverifiable token");
                Rejection::from_decode(e).reason
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::tests::get_test_config;
    use crate::auth::jwt::TokenIssuer;
    use crate::store::{MemoryStore, UnavailableStore};
    use crate::users::User;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::sync::Arc;
    use std::time::Duration;

    fn setup() -> (TokenIssuer, TokenValidator, JwtBlacklistRepository) {
        let config = get_test_config();
        let blacklist = JwtBlacklistRepository::new(Arc::new(MemoryStore::new()));
        (
            TokenIssuer::new(&config),
            TokenValidator::new(&config, blacklist.clone()),
            blacklist,
        )
    }

    fn sign(claims: &Claims, header: &Header, secret: &str) -> String {
        encode(header, claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn claims_for(user: &User) -> Claims {
        let config = get_test_config();
        Claims::new(user, 3600, config.issuer.clone(), config.audiences())
    }

    fn rejection(outcome: TokenValidation) -> AuthError {
        match outcome {
            TokenValidation::Rejected(r) => r.reason,
            TokenValidation::Valid(user) => panic!("expected rejection, got {:?}", user),
        }
    }

    #[tokio::test]
    async fn test_valid_token_yields_identity() {
        let (issuer, validator, _) = setup();
        let user = User::test_fixture("alice", "user");
        let token = issuer.issue_access_token(&user).unwrap();

        match validator.validate(&token).await.unwrap() {
            TokenValidation::Valid(identity) => {
                assert_eq!(identity.user_id, user.id);
                assert_eq!(identity.username, "alice");
                assert_eq!(identity.role, "user");
            }
            TokenValidation::Rejected(r) => panic!("unexpected rejection: {}", r.message()),
        }
    }

    #[tokio::test]
    async fn test_garbage_is_a_format_error() {
        let (_, validator, _) = setup();
        let outcome = validator.validate("invalid.token.here").await.unwrap();
        assert_eq!(rejection(outcome), AuthError::InvalidTokenFormat);
    }

    #[tokio::test]
    async fn test_tampered_token() {
        let (issuer, validator, _) = setup();
        let token = issuer
            .issue_access_token(&User::test_fixture("alice", "user"))
            .unwrap();

        let tampered = format!("{}X", token);
        assert!(!validator.validate(&tampered).await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_wrong_secret_is_rejected() {
        let (_, validator, _) = setup();
        let claims = claims_for(&User::test_fixture("alice", "admin"));
        let token = sign(&claims, &Header::default(), "some-other-secret-of-sufficient-length");

        let outcome = validator.validate(&token).await.unwrap();
        assert_eq!(rejection(outcome), AuthError::InvalidToken);
    }

    #[tokio::test]
    async fn test_other_algorithm_is_rejected() {
        let (_, validator, _) = setup();
        let claims = claims_for(&User::test_fixture("alice", "user"));
        let header = Header::new(Algorithm::HS512);
        let token = sign(&claims, &header, &get_test_config().secret);

        assert!(!validator.validate(&token).await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_expired_token_reports_expiry() {
        let (_, validator, _) = setup();
        let mut claims = claims_for(&User::test_fixture("alice", "user"));
        claims.iat -= 7200;
        claims.nbf -= 7200;
        claims.exp = chrono::Utc::now().timestamp() - 60;
        let token = sign(&claims, &Header::default(), &get_test_config().secret);

        let outcome = validator.validate(&token).await.unwrap();
        assert_eq!(rejection(outcome), AuthError::ExpiredToken);
    }

    #[tokio::test]
    async fn test_wrong_issuer() {
        let (_, validator, _) = setup();
        let mut claims = claims_for(&User::test_fixture("alice", "user"));
        claims.iss = "other-service".to_string();
        let token = sign(&claims, &Header::default(), &get_test_config().secret);

        let outcome = validator.validate(&token).await.unwrap();
        assert_eq!(rejection(outcome), AuthError::InvalidToken);
    }

    #[tokio::test]
    async fn test_wrong_audience() {
        let (_, validator, _) = setup();
        let mut claims = claims_for(&User::test_fixture("alice", "user"));
        claims.aud = vec!["some-other-app".to_string()];
        let token = sign(&claims, &Header::default(), &get_test_config().secret);

        assert!(!validator.validate(&token).await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_blacklisted_token_is_revoked() {
        let (issuer, validator, blacklist) = setup();
        let token = issuer
            .issue_access_token(&User::test_fixture("alice", "user"))
            .unwrap();
        let claims = validator.decode_for_revocation(&token).unwrap();

        blacklist
            .add_to_blacklist(&claims.jti, Duration::from_secs(60))
            .await
            .unwrap();

        let outcome = validator.validate(&token).await.unwrap();
        let reason = rejection(outcome);
        assert_eq!(reason, AuthError::TokenRevoked);
        assert_eq!(reason.to_string(), "token has been revoked");
    }

    #[test]
    fn test_revocation_decode_tolerates_expiry_but_not_forgery() {
        let (_, validator, _) = setup();
        let mut claims = claims_for(&User::test_fixture("alice", "user"));
        claims.exp = chrono::Utc::now().timestamp() - 60;

        let expired = sign(&claims, &Header::default(), &get_test_config().secret);
        assert!(validator.decode_for_revocation(&expired).is_ok());

        let forged = sign(&claims, &Header::default(), "attacker-controlled-secret-value");
        assert_eq!(
            validator.decode_for_revocation(&forged).unwrap_err(),
            AuthError::InvalidToken
        );
    }

    #[tokio::test]
    async fn test_blacklist_outage_is_an_error_not_a_rejection() {
        let config = get_test_config();
        let validator = TokenValidator::new(
            &config,
            JwtBlacklistRepository::new(Arc::new(UnavailableStore)),
        );
        let token = TokenIssuer::new(&config)
            .issue_access_token(&User::test_fixture("alice", "user"))
            .unwrap();

        assert!(matches!(
            validator.validate(&token).await,
            Err(StoreError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_token_is_rejected_without_touching_the_store() {
        let config = get_test_config();
        let validator = TokenValidator::new(
            &config,
            JwtBlacklistRepository::new(Arc::new(UnavailableStore)),
        );

        let outcome = validator.validate("invalid.token.here").await.unwrap();
        assert_eq!(rejection(outcome), AuthError::InvalidTokenFormat);
    }
}
