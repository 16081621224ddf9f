//! Repository seam between the ledger engine and persistence.
//!
//! The engine never touches storage directly; it loads wallet snapshots,
//! computes the next state, and hands the result back through one of the
//! atomic commit methods. Atomicity and the optimistic version check live
//! behind this trait: wallet mutation and record append become observable
//! together or not at all, enforced by the interface contract rather than
//! by incidental storage behavior.

use crate::types::{
    Currency, LedgerError, RecordId, TransactionRecord, UserId, Wallet, WalletId,
};

/// Storage contract for wallets and their transaction records.
///
/// Implementations must guarantee:
/// - commits are atomic: the wallet state, every record passed in, and the
///   optional refund flip become visible together or not at all;
/// - a commit succeeds only if the passed snapshot's version equals the
///   stored version; the stored wallet's version is bumped on success;
/// - a duplicate idempotency key among completed records is refused;
/// - reads observe committed state only.
pub trait LedgerStore: Send + Sync {
    /// Returns a snapshot of the wallet for `(user, currency)`, creating
    /// it lazily on first touch.
    fn load_or_create(&self, user: UserId, currency: Currency) -> Wallet;

    /// Returns a snapshot of an existing wallet, if any.
    fn get(&self, user: UserId, currency: Currency) -> Option<Wallet>;

    /// Returns a snapshot of an existing wallet by id, if any.
    fn get_by_id(&self, wallet: WalletId) -> Option<Wallet>;

    /// Atomically applies a wallet snapshot and appends its records.
    ///
    /// `refunded` names an earlier record to flip from `Completed` to
    /// `Refunded` in the same commit (the refund path).
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ConcurrentModification`] if the snapshot's
    /// version is stale or a record's idempotency key is already taken;
    /// nothing is applied in that case.
    fn commit(
        &self,
        wallet: Wallet,
        records: Vec<TransactionRecord>,
        refunded: Option<RecordId>,
    ) -> Result<(), LedgerError>;

    /// Atomically applies two wallet snapshots and the transfer pair.
    ///
    /// Implementations must take the two wallet locks in ascending
    /// [`WalletId`] order so opposite-direction transfers cannot deadlock.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ConcurrentModification`] if either version
    /// is stale or an idempotency key is already taken; neither wallet is
    /// touched in that case.
    fn commit_pair(
        &self,
        source: Wallet,
        dest: Wallet,
        records: Vec<TransactionRecord>,
    ) -> Result<(), LedgerError>;

    /// Appends a failed record outside any wallet commit.
    ///
    /// Business-rule rejections stay auditable without mutating balances.
    fn append_failed(&self, record: TransactionRecord);

    /// Looks up the completed record carrying this idempotency key.
    fn find_by_idempotency_key(&self, key: &str) -> Option<TransactionRecord>;

    /// Looks up a record by id.
    fn record(&self, id: RecordId) -> Option<TransactionRecord>;

    /// All records of one wallet in commit order, oldest first.
    fn wallet_records(&self, wallet: WalletId) -> Vec<TransactionRecord>;
}
