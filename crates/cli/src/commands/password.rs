//! Password hashing helper.
//!
//! Prints a credential record for pasting into a seed file or the database.
//! Argon2 is the default; `--sha256` produces a salted-digest record with a
//! random 16-byte salt.

use rand::Rng;

use bubbling_bath_storefront::services::auth::AuthError;
use bubbling_bath_storefront::services::auth::password::{
    hash_password, sha256_record, validate_password,
};

/// Hash `password` in the requested format.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short, or
/// `AuthError::PasswordHash` if Argon2 fails.
pub fn hash(password: &str, sha256: bool) -> Result<String, AuthError> {
    validate_password(password)?;
    if sha256 {
        let salt: [u8; 16] = rand::rng().random();
        Ok(sha256_record(password, &hex::encode(salt)))
    } else {
        hash_password(password)
    }
}
