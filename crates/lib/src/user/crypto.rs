//! Credential hashing for the user store
//!
//! Secrets are stored as Argon2id PHC strings, which carry their own salt and
//! parameters. Verification goes through the argon2 verifier, which compares
//! in constant time.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::rngs::OsRng;

use super::errors::UserError;
use crate::Result;

/// Hash a secret using Argon2id with a fresh random salt
///
/// # Returns
/// The hash in PHC string format, including algorithm, parameters and salt.
pub fn hash_password(password: impl AsRef<str>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_ref().as_bytes(), &salt)
        .map_err(|e| UserError::PasswordHashingFailed {
            reason: e.to_string(),
        })?
        .to_string();

    Ok(password_hash)
}

/// Verify a secret against a stored PHC hash
///
/// # Returns
/// `Ok(true)` on a match and `Ok(false)` on a mismatch. A hash that cannot be
/// parsed is reported as `UserError::CorruptCredential` for `user_id`.
pub fn verify_password(
    user_id: &str,
    password: impl AsRef<str>,
    password_hash: impl AsRef<str>,
) -> Result<bool> {
    let parsed_hash =
        PasswordHash::new(password_hash.as_ref()).map_err(|_| UserError::CorruptCredential {
            user_id: user_id.to_string(),
        })?;

    Ok(Argon2::default()
        .verify_password(password.as_ref().as_bytes(), &parsed_hash)
        .is_ok())
}
