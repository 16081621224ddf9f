//! Injected ledger configuration.
//!
//! Everything tunable about the engine lives here so callers inject policy
//! instead of the ledger reading global configuration. Defaults follow the
//! production system this ledger was built for.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tunable limits and thresholds for the ledger engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerPolicy {
    /// Withdrawals and transfers at or above this magnitude require a
    /// verified payment password.
    pub password_threshold: Decimal,

    /// Hard cap on any single operation amount.
    pub max_amount: Decimal,

    /// How many times the engine retries a version conflict before
    /// surfacing `ConcurrentModificationError` to the caller.
    pub max_commit_retries: u32,

    /// Refunds are only accepted within this many days of the original
    /// record; `None` disables the window.
    pub refund_window_days: Option<i64>,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        LedgerPolicy {
            password_threshold: Decimal::new(1000, 0),
            // 15 digits with 2 decimal places, the widest amount the
            // original schema could hold.
            max_amount: Decimal::new(999_999_999_999_999, 2),
            max_commit_retries: 3,
            refund_window_days: Some(30),
        }
    }
}
