//! Stored password hash formats.
//!
//! | Prefix | Format | Verification |
//! |---|---|---|
//! | `$argon2` | PHC string | `argon2` |
//! | `sha256$` | `sha256$<salt>$<hex digest of salt + password>` | constant-time digest compare |
//! | `plain$` | `plain$<password>` | legacy records, constant-time equality |
//!
//! Anything else never verifies.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sha2::{Digest, Sha256};

use super::AuthError;

/// Minimum password length for newly hashed passwords.
pub const MIN_PASSWORD_LENGTH: usize = 8;

const SHA256_PREFIX: &str = "sha256$";
const PLAIN_PREFIX: &str = "plain$";

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Build a salted SHA-256 record (`sha256$<salt>$<hex>`).
#[must_use]
pub fn sha256_record(password: &str, salt: &str) -> String {
    format!("{SHA256_PREFIX}{salt}${}", sha256_hex(salt, password))
}

fn sha256_hex(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check `password` against a stored record.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    if stored.starts_with("$argon2") {
        let Ok(parsed) = PasswordHash::new(stored) else {
            return false;
        };
        return Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok();
    }

    if let Some(rest) = stored.strip_prefix(SHA256_PREFIX) {
        let Some((salt, expected)) = rest.split_once('$') else {
            return false;
        };
        let actual = sha256_hex(salt, password);
        return constant_time_compare(&actual, &expected.to_ascii_lowercase());
    }

    if let Some(expected) = stored.strip_prefix(PLAIN_PREFIX) {
        return constant_time_compare(password, expected);
    }

    false
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
