//! Argon2id password hashing for user credentials.

use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;

use super::error::EntityError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Verified against when no account matches a login.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("no-such-account-password").ok());

/// Hash a password into a PHC string.
///
/// # Errors
/// Returns `INVALID_ATTRIBUTES` for short passwords and `INTERNAL` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, EntityError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(EntityError::invalid(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LENGTH} characters long."),
        ));
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| EntityError::Internal("failed to hash password".to_string()))
}

/// Verify a password against a stored PHC string. Malformed hashes never verify.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Spend one verification on the placeholder hash. Always fails.
pub fn verify_dummy(password: &str) -> bool {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        verify_password(password, hash);
    }
    false
}
