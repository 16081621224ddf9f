//! Types module
//!
//! Contains core data structures used throughout the ledger:
//! - `money`: fixed-precision monetary amounts with currency tags
//! - `wallet`: per-user wallet state
//! - `transaction`: immutable transaction records
//! - `error`: error types for ledger operations
//!
//! Typed identifiers live here so every module shares the same id
//! definitions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod error;
pub mod money;
pub mod transaction;
pub mod wallet;

pub use error::LedgerError;
pub use money::{Currency, Money};
pub use transaction::{RecordId, TransactionRecord, TransactionStatus, TransactionType};
pub use wallet::{Wallet, WalletStatus};

/// Generates a uuid-backed identifier newtype.
///
/// Typed ids prevent accidentally passing a `UserId` where a `WalletId`
/// is expected.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an id from an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

typed_id!(UserId, "Unique identifier for a wallet owner.");
typed_id!(WalletId, "Unique identifier for a wallet.");

pub(crate) use typed_id;
