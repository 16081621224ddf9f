//! Thread-safe in-memory ledger storage.
//!
//! `MemoryLedgerStore` keeps wallets in a `DashMap` of mutex-held slots and
//! records in one append-only log. The per-wallet mutex serializes commits
//! against the same wallet; the version stamp turns a stale snapshot into
//! [`LedgerError::ConcurrentModification`] instead of a lost update.
//!
//! Lock order is fixed everywhere: wallet slot(s) first - ascending
//! [`WalletId`] when two are involved - then the record log. Reads take at
//! most one of them, so no interleaving can deadlock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;

use crate::types::{
    Currency, LedgerError, RecordId, TransactionRecord, UserId, Wallet, WalletId,
};

use super::traits::LedgerStore;

type WalletKey = (UserId, Currency);

/// In-memory [`LedgerStore`] implementation.
///
/// Suitable for tests and single-process deployments; the trait seam is
/// where a database-backed implementation would plug in.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    /// One slot per (user, currency); the mutex serializes commits.
    wallets: DashMap<WalletKey, Arc<Mutex<Wallet>>>,
    /// Wallet-id lookup for refunds, which only know the record's wallet.
    by_id: DashMap<WalletId, WalletKey>,
    /// Append-only record log in commit order.
    log: Mutex<Vec<TransactionRecord>>,
    /// Record-id index into `log`.
    by_record: DashMap<RecordId, usize>,
    /// Completed-record idempotency index.
    idempotency: DashMap<String, RecordId>,
}

/// A poisoned slot still holds consistent state - commits replace the
/// wallet wholesale - so recover the guard instead of propagating panics.
fn relock<'a, T>(
    result: Result<MutexGuard<'a, T>, PoisonError<MutexGuard<'a, T>>>,
) -> MutexGuard<'a, T> {
    result.unwrap_or_else(PoisonError::into_inner)
}

impl MemoryLedgerStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, user: UserId, currency: Currency) -> Arc<Mutex<Wallet>> {
        let entry = self.wallets.entry((user, currency)).or_insert_with(|| {
            let wallet = Wallet::new(user, currency);
            self.by_id.insert(wallet.id(), (user, currency));
            Arc::new(Mutex::new(wallet))
        });
        Arc::clone(&entry)
    }

    /// Commits apply only to wallets that have been loaded; a snapshot of
    /// a wallet this store never issued is treated as stale.
    fn existing_slot(&self, wallet: &Wallet) -> Result<Arc<Mutex<Wallet>>, LedgerError> {
        self.wallets
            .get(&(wallet.user(), wallet.currency()))
            .map(|slot| Arc::clone(&slot))
            .ok_or_else(|| LedgerError::concurrent_modification(wallet.id()))
    }

    /// Refuses a commit whose idempotency key is already taken.
    fn check_idempotency(&self, records: &[TransactionRecord], wallet: WalletId) -> Result<(), LedgerError> {
        for record in records {
            if let Some(key) = record.idempotency_key.as_deref() {
                if self.idempotency.contains_key(key) {
                    return Err(LedgerError::concurrent_modification(wallet));
                }
            }
        }
        Ok(())
    }

    /// Appends records to the log and maintains both indexes.
    ///
    /// Caller holds the wallet lock(s) and the log guard.
    fn append(&self, log: &mut Vec<TransactionRecord>, records: Vec<TransactionRecord>) {
        for record in records {
            if let Some(key) = record.idempotency_key.clone() {
                self.idempotency.insert(key, record.id);
            }
            self.by_record.insert(record.id, log.len());
            log.push(record);
        }
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn load_or_create(&self, user: UserId, currency: Currency) -> Wallet {
        let slot = self.slot(user, currency);
        let guard = relock(slot.lock());
        guard.clone()
    }

    fn get(&self, user: UserId, currency: Currency) -> Option<Wallet> {
        let slot = Arc::clone(&*self.wallets.get(&(user, currency))?);
        let guard = relock(slot.lock());
        Some(guard.clone())
    }

    fn get_by_id(&self, wallet: WalletId) -> Option<Wallet> {
        let (user, currency) = *self.by_id.get(&wallet)?;
        self.get(user, currency)
    }

    fn commit(
        &self,
        wallet: Wallet,
        records: Vec<TransactionRecord>,
        refunded: Option<RecordId>,
    ) -> Result<(), LedgerError> {
        let slot = self.existing_slot(&wallet)?;
        let mut guard = relock(slot.lock());

        if guard.version() != wallet.version() {
            return Err(LedgerError::concurrent_modification(wallet.id()));
        }

        let mut log = relock(self.log.lock());
        self.check_idempotency(&records, wallet.id())?;

        // Flip the refunded original first; its transition can still be
        // refused and nothing may be applied in that case.
        if let Some(original) = refunded {
            let idx = *self
                .by_record
                .get(&original)
                .ok_or_else(|| {
                    LedgerError::invalid_state_transition(original, "no such record")
                })?;
            log[idx].mark_refunded()?;
        }

        let mut committed = wallet;
        committed.bump_version();
        *guard = committed;

        self.append(&mut log, records);
        Ok(())
    }

    fn commit_pair(
        &self,
        source: Wallet,
        dest: Wallet,
        records: Vec<TransactionRecord>,
    ) -> Result<(), LedgerError> {
        if source.id() == dest.id() {
            return Err(LedgerError::SelfTransfer);
        }

        let source_slot = self.existing_slot(&source)?;
        let dest_slot = self.existing_slot(&dest)?;

        // Ascending wallet-id order, so two opposite-direction transfers
        // always contend in the same sequence.
        let (mut source_guard, mut dest_guard) = if source.id() < dest.id() {
            let source_guard = relock(source_slot.lock());
            let dest_guard = relock(dest_slot.lock());
            (source_guard, dest_guard)
        } else {
            let dest_guard = relock(dest_slot.lock());
            let source_guard = relock(source_slot.lock());
            (source_guard, dest_guard)
        };

        if source_guard.version() != source.version() {
            return Err(LedgerError::concurrent_modification(source.id()));
        }
        if dest_guard.version() != dest.version() {
            return Err(LedgerError::concurrent_modification(dest.id()));
        }

        let mut log = relock(self.log.lock());
        self.check_idempotency(&records, source.id())?;

        let mut committed_source = source;
        committed_source.bump_version();
        *source_guard = committed_source;

        let mut committed_dest = dest;
        committed_dest.bump_version();
        *dest_guard = committed_dest;

        self.append(&mut log, records);
        Ok(())
    }

    fn append_failed(&self, record: TransactionRecord) {
        let mut log = relock(self.log.lock());
        self.by_record.insert(record.id, log.len());
        log.push(record);
    }

    fn find_by_idempotency_key(&self, key: &str) -> Option<TransactionRecord> {
        let id = *self.idempotency.get(key)?;
        self.record(id)
    }

    fn record(&self, id: RecordId) -> Option<TransactionRecord> {
        let idx = *self.by_record.get(&id)?;
        let log = relock(self.log.lock());
        log.get(idx).cloned()
    }

    fn wallet_records(&self, wallet: WalletId) -> Vec<TransactionRecord> {
        let log = relock(self.log.lock());
        log.iter()
            .filter(|record| record.wallet_id == wallet)
            .cloned()
            .collect()
    }
}
