//! Transaction record types for the wallet ledger.
//!
//! A [`TransactionRecord`] is the immutable log entry describing one ledger
//! event. Records are append-only from the caller's perspective: once a
//! record reaches a terminal status, only the refund compensation path may
//! change it, and only from `Completed` to `Refunded`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::LedgerError;
use super::money::Money;
use super::{typed_id, WalletId};

typed_id!(RecordId, "Unique identifier for a transaction record.");

/// Ledger event types.
///
/// Deposits and withdrawals change the wallet balance; freezes and
/// unfreezes move value between available and frozen without changing it;
/// transfers produce a linked out/in pair; refunds compensate a completed
/// debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Credit funds into a wallet
    Deposit,
    /// Debit funds out of a wallet
    Withdraw,
    /// Debit side of a peer-to-peer transfer
    TransferOut,
    /// Credit side of a peer-to-peer transfer
    TransferIn,
    /// Move funds from available to frozen
    Freeze,
    /// Move funds from frozen back to available
    Unfreeze,
    /// Compensating credit for a refunded debit
    Refund,
}

impl TransactionType {
    /// True for types that increase the wallet's lifetime income.
    pub fn is_income(self) -> bool {
        matches!(
            self,
            TransactionType::Deposit | TransactionType::TransferIn | TransactionType::Refund
        )
    }

    /// True for types that increase the wallet's lifetime expense.
    pub fn is_expense(self) -> bool {
        matches!(self, TransactionType::Withdraw | TransactionType::TransferOut)
    }

    /// True for the debit types a refund may compensate.
    pub fn is_refundable(self) -> bool {
        self.is_expense()
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdraw => "withdraw",
            TransactionType::TransferOut => "transfer_out",
            TransactionType::TransferIn => "transfer_in",
            TransactionType::Freeze => "freeze",
            TransactionType::Unfreeze => "unfreeze",
            TransactionType::Refund => "refund",
        };
        f.write_str(name)
    }
}

/// Lifecycle status of a transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Created, not yet finalized
    Pending,
    /// Applied together with the wallet mutation
    Completed,
    /// Rejected by a business rule after validation passed
    Failed,
    /// Completed, then compensated by a refund record
    Refunded,
}

/// One immutable ledger event.
///
/// Created in `Pending` status at operation start and finalized to
/// `Completed` or `Failed` atomically with the wallet mutation. The
/// lifecycle fields are private so the single-use transitions cannot be
/// bypassed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Unique, externally referenceable id
    pub id: RecordId,
    /// The wallet this event belongs to
    pub wallet_id: WalletId,
    /// What kind of event this is
    pub tx_type: TransactionType,
    /// Event magnitude; always strictly positive
    pub amount: Money,
    /// The other wallet of a transfer pair
    pub counterparty: Option<WalletId>,
    /// Shared by the two records of one transfer
    pub correlation_id: Option<Uuid>,
    /// For refunds, the record being compensated
    pub refers_to: Option<RecordId>,
    /// Caller-supplied retry token; unique among completed records
    pub idempotency_key: Option<String>,
    /// When the operation started
    pub created_at: DateTime<Utc>,
    /// Free-form annotation carried with the record
    pub metadata: serde_json::Value,

    status: TransactionStatus,
    completed_at: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
}

impl TransactionRecord {
    /// Creates a new pending record.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAmount`] unless `amount` is strictly
    /// positive; record amounts are magnitudes, signs live in the type.
    pub fn new(
        wallet_id: WalletId,
        tx_type: TransactionType,
        amount: Money,
        created_at: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::invalid_amount(
                amount.amount(),
                "record amount must be positive",
            ));
        }
        Ok(TransactionRecord {
            id: RecordId::new(),
            wallet_id,
            tx_type,
            amount,
            counterparty: None,
            correlation_id: None,
            refers_to: None,
            idempotency_key: None,
            created_at,
            metadata: serde_json::Value::Null,
            status: TransactionStatus::Pending,
            completed_at: None,
            failure_reason: None,
        })
    }

    /// Sets the counterparty wallet of a transfer record.
    pub fn with_counterparty(mut self, counterparty: WalletId) -> Self {
        self.counterparty = Some(counterparty);
        self
    }

    /// Sets the correlation id shared by a transfer pair.
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Links a refund record to the original it compensates.
    pub fn with_refers_to(mut self, original: RecordId) -> Self {
        self.refers_to = Some(original);
        self
    }

    /// Attaches the caller's idempotency key.
    pub fn with_idempotency_key(mut self, key: Option<String>) -> Self {
        self.idempotency_key = key;
        self
    }

    /// Attaches free-form metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Current lifecycle status.
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// When the record was finalized, if it was.
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Why the operation failed, for `Failed` records.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Finalizes a pending record as completed.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidStateTransition`] if the record is
    /// not pending; terminal transitions are single-use.
    pub fn mark_completed(&mut self, at: DateTime<Utc>) -> Result<(), LedgerError> {
        if self.status != TransactionStatus::Pending {
            return Err(LedgerError::invalid_state_transition(
                self.id,
                "only a pending record can be completed",
            ));
        }
        self.status = TransactionStatus::Completed;
        self.completed_at = Some(at);
        Ok(())
    }

    /// Finalizes a pending record as failed, keeping the reason.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidStateTransition`] if the record is
    /// not pending; terminal transitions are single-use.
    pub fn mark_failed(&mut self, reason: &str, at: DateTime<Utc>) -> Result<(), LedgerError> {
        if self.status != TransactionStatus::Pending {
            return Err(LedgerError::invalid_state_transition(
                self.id,
                "only a pending record can be failed",
            ));
        }
        self.status = TransactionStatus::Failed;
        self.failure_reason = Some(reason.to_string());
        self.completed_at = Some(at);
        Ok(())
    }

    /// Flips a completed debit to refunded.
    ///
    /// This is the one permitted post-completion change; it is what makes
    /// a second refund attempt detectable.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AlreadyRefunded`] if the record was refunded
    /// before, [`LedgerError::InvalidStateTransition`] for any other
    /// non-completed status.
    pub fn mark_refunded(&mut self) -> Result<(), LedgerError> {
        match self.status {
            TransactionStatus::Completed => {
                self.status = TransactionStatus::Refunded;
                Ok(())
            }
            TransactionStatus::Refunded => Err(LedgerError::already_refunded(self.id)),
            _ => Err(LedgerError::invalid_state_transition(
                self.id,
                "only a completed record can be refunded",
            )),
        }
    }
}
