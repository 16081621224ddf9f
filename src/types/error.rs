//! Error types for the wallet ledger.
//!
//! This module defines all errors that can occur during ledger operations.
//! Each variant carries enough context to diagnose the failure without a
//! stack trace.
//!
//! # Error Categories
//!
//! - **Shape errors**: invalid amount, precision, out-of-range, currency
//!   mismatch, self transfer. Raised before any wallet state is read; no
//!   transaction record is written for them.
//! - **Business-rule errors**: insufficient funds, locked wallet, bad
//!   payment password. Raised after validation; the engine writes a
//!   `failed` transaction record so the attempt stays auditable.
//! - **Infrastructure errors**: concurrent modification. Retried a bounded
//!   number of times before surfacing.

use rust_decimal::Decimal;
use thiserror::Error;

use super::money::Currency;
use super::transaction::RecordId;
use super::WalletId;

/// Main error type for the wallet ledger.
///
/// The caller-facing API layer is expected to map each variant to a stable
/// response code; the ledger itself never formats user-facing messages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Amount failed validation (non-positive, or state-dependent bounds
    /// such as unfreezing more than is frozen).
    #[error("invalid amount {amount}: {reason}")]
    InvalidAmount {
        /// The offending amount
        amount: Decimal,
        /// Why the amount was rejected
        reason: String,
    },

    /// Two different currencies met where one was required.
    ///
    /// Amounts are never converted implicitly.
    #[error("currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch {
        /// The currency the operation was addressed to
        expected: Currency,
        /// The currency actually supplied
        found: Currency,
    },

    /// The available balance does not cover the requested debit.
    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        /// Available balance (balance minus frozen)
        available: Decimal,
        /// Requested amount
        requested: Decimal,
    },

    /// The wallet is locked and rejects all balance operations.
    #[error("wallet {wallet} is locked")]
    WalletLocked {
        /// The locked wallet
        wallet: WalletId,
    },

    /// Payment-password verification failed.
    ///
    /// Reported, not fatal: no state is mutated beyond the failed record.
    #[error("payment password verification failed")]
    InvalidCredentials,

    /// Source and destination of a transfer are the same wallet.
    #[error("cannot transfer from a wallet to itself")]
    SelfTransfer,

    /// The record was already refunded; a second compensation is refused.
    #[error("record {record} has already been refunded")]
    AlreadyRefunded {
        /// The previously refunded record
        record: RecordId,
    },

    /// A record transition was requested that its current status forbids.
    #[error("invalid state transition for record {record}: {reason}")]
    InvalidStateTransition {
        /// The record whose transition was refused
        record: RecordId,
        /// Why the transition is not allowed
        reason: String,
    },

    /// The wallet changed underneath the operation.
    ///
    /// The engine retries internally a bounded number of times; if this
    /// surfaces, the caller should retry the whole operation.
    #[error("concurrent modification of wallet {wallet}")]
    ConcurrentModification {
        /// The contended wallet
        wallet: WalletId,
    },

    /// Amount exceeds the configured maximum or overflows the arithmetic.
    #[error("amount {amount} is out of range (maximum {max})")]
    AmountOutOfRange {
        /// The offending amount
        amount: Decimal,
        /// The maximum the ledger accepts
        max: Decimal,
    },

    /// Amount carries more fractional digits than the currency allows.
    #[error("amount {amount} exceeds the {scale}-digit minor unit of {currency}")]
    Precision {
        /// The offending amount
        amount: Decimal,
        /// The currency whose scale was violated
        currency: Currency,
        /// The currency's minor-unit scale
        scale: u32,
    },
}

// Helper functions for creating common errors

impl LedgerError {
    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: Decimal, reason: &str) -> Self {
        LedgerError::InvalidAmount {
            amount,
            reason: reason.to_string(),
        }
    }

    /// Create a CurrencyMismatch error
    pub fn currency_mismatch(expected: Currency, found: Currency) -> Self {
        LedgerError::CurrencyMismatch { expected, found }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(available: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientFunds {
            available,
            requested,
        }
    }

    /// Create a WalletLocked error
    pub fn wallet_locked(wallet: WalletId) -> Self {
        LedgerError::WalletLocked { wallet }
    }

    /// Create an AlreadyRefunded error
    pub fn already_refunded(record: RecordId) -> Self {
        LedgerError::AlreadyRefunded { record }
    }

    /// Create an InvalidStateTransition error
    pub fn invalid_state_transition(record: RecordId, reason: &str) -> Self {
        LedgerError::InvalidStateTransition {
            record,
            reason: reason.to_string(),
        }
    }

    /// Create a ConcurrentModification error
    pub fn concurrent_modification(wallet: WalletId) -> Self {
        LedgerError::ConcurrentModification { wallet }
    }

    /// Create an AmountOutOfRange error
    pub fn amount_out_of_range(amount: Decimal, max: Decimal) -> Self {
        LedgerError::AmountOutOfRange { amount, max }
    }

    /// Create a Precision error
    pub fn precision(amount: Decimal, currency: Currency) -> Self {
        LedgerError::Precision {
            amount,
            currency,
            scale: currency.minor_unit_scale(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn wallet_id() -> WalletId {
        WalletId::from_uuid(Uuid::nil())
    }

    fn record_id() -> RecordId {
        RecordId::from_uuid(Uuid::nil())
    }

    #[rstest]
    #[case::invalid_amount(
        LedgerError::invalid_amount(dec!(-1.00), "amount must be positive"),
        "invalid amount -1.00: amount must be positive"
    )]
    #[case::currency_mismatch(
        LedgerError::currency_mismatch(Currency::Cny, Currency::Usd),
        "currency mismatch: expected CNY, found USD"
    )]
    #[case::insufficient_funds(
        LedgerError::insufficient_funds(dec!(100.00), dec!(150.00)),
        "insufficient funds: available 100.00, requested 150.00"
    )]
    #[case::invalid_credentials(
        LedgerError::InvalidCredentials,
        "payment password verification failed"
    )]
    #[case::self_transfer(
        LedgerError::SelfTransfer,
        "cannot transfer from a wallet to itself"
    )]
    #[case::amount_out_of_range(
        LedgerError::amount_out_of_range(dec!(1000000), dec!(999999)),
        "amount 1000000 is out of range (maximum 999999)"
    )]
    #[case::precision(
        LedgerError::precision(dec!(1.001), Currency::Usd),
        "amount 1.001 exceeds the 2-digit minor unit of USD"
    )]
    fn test_error_display(#[case] error: LedgerError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn test_wallet_context_display() {
        let locked = LedgerError::wallet_locked(wallet_id());
        assert_eq!(
            locked.to_string(),
            format!("wallet {} is locked", Uuid::nil())
        );

        let contended = LedgerError::concurrent_modification(wallet_id());
        assert_eq!(
            contended.to_string(),
            format!("concurrent modification of wallet {}", Uuid::nil())
        );
    }

    #[test]
    fn test_record_context_display() {
        let refunded = LedgerError::already_refunded(record_id());
        assert_eq!(
            refunded.to_string(),
            format!("record {} has already been refunded", Uuid::nil())
        );

        let transition = LedgerError::invalid_state_transition(record_id(), "already completed");
        assert_eq!(
            transition.to_string(),
            format!(
                "invalid state transition for record {}: already completed",
                Uuid::nil()
            )
        );
    }
}
