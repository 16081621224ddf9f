//! Argon2id hashing for the payment password.
//!
//! The ledger never stores or logs the plaintext; wallets carry the PHC
//! string produced here and verification is constant-time inside argon2.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, PasswordHash,
};
use thiserror::Error;

use crate::types::LedgerError;

/// Errors from payment-password hashing and verification.
#[derive(Debug, Error)]
pub enum PasswordError {
    /// Failed to hash the password.
    #[error("failed to hash payment password: {0}")]
    Hash(String),

    /// Verification failed for a reason other than a wrong password.
    #[error("failed to verify payment password: {0}")]
    Verify(String),

    /// The stored hash is not a valid PHC string.
    #[error("invalid payment password hash format")]
    InvalidHash,
}

impl From<PasswordError> for LedgerError {
    fn from(_: PasswordError) -> Self {
        // Any hashing-layer failure surfaces as a credentials failure;
        // callers must not learn whether the stored hash was readable.
        LedgerError::InvalidCredentials
    }
}

/// Hashes a payment password with Argon2id.
///
/// # Errors
///
/// Returns [`PasswordError::Hash`] if hashing fails.
pub fn hash_payment_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Verifies a payment-password candidate against a stored hash.
///
/// Returns `false` for a wrong password; an `Err` means the stored hash
/// could not be checked at all.
///
/// # Errors
///
/// Returns [`PasswordError::InvalidHash`] if the stored hash is not a
/// valid PHC string and [`PasswordError::Verify`] for unexpected
/// verification failures.
pub fn verify_payment_password(candidate: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHash)?;

    let argon2 = Argon2::default();

    match argon2.verify_password(candidate.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::Verify(e.to_string())),
    }
}
