//! Payment-password hashing.
//!
//! The payment password gates large withdrawals and transfers. Only its
//! Argon2id hash is ever stored on the wallet.

pub mod password;

pub use password::{hash_payment_password, verify_payment_password, PasswordError};
