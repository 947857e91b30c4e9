/// Password Hashing and Verification
///
/// bcrypt hashing for registration and credential checks for login.

use bcrypt::{hash, verify, DEFAULT_COST};
use lazy_static::lazy_static;

use crate::error::{AppError, AuthError, ValidationError};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 72; // bcrypt only reads the first 72 bytes

lazy_static! {
    // Same cost as real hashes, so a miss takes as long as a mismatch
    static ref DUMMY_HASH: Option<String> = hash("no-such-account-placeholder", DEFAULT_COST).ok();
}

/// Hash a password using bcrypt after checking its strength
pub fn hash_password(password: &str) -> Result<String, AppError> {
    validate_password_strength(password)?;

    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Check a login attempt against the stored hash.
///
/// # Errors
/// `AuthError::InvalidCredentials` on mismatch; an unreadable hash is an
/// internal error.
pub fn verify_password(password: &str, password_hash: &str) -> Result<(), AppError> {
    let matches = verify(password, password_hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;

    if matches {
        Ok(())
    } else {
        Err(AuthError::InvalidCredentials.into())
    }
}

/// Spend one bcrypt verification on a login for an unknown account, so
/// response time does not reveal whether the username exists.
pub fn verify_against_dummy(password: &str) {
    if let Some(dummy) = DUMMY_HASH.as_deref() {
        let _ = verify(password, dummy);
    }
}

/// Requirements:
/// - 8 to 72 characters
/// - At least one digit, one lowercase and one uppercase letter
fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort(
            "password".to_string(),
            MIN_PASSWORD_LENGTH,
        ));
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong(
            "password".to_string(),
            MAX_PASSWORD_LENGTH,
        ));
    }

    let has_digit = password.chars().any(|c| c.is_numeric());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_uppercase());

    if !has_digit || !has_lowercase || !has_uppercase {
        return Err(ValidationError::InvalidFormat(
            "password must contain at least one digit, one lowercase letter, and one uppercase letter"
                .to_string(),
        ));
    }

    Ok(())
}
