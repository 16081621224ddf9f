//! The ledger engine.
//!
//! `LedgerEngine` orchestrates every state-changing wallet operation:
//! deposits, withdrawals, transfers, freezes, unfreezes and refunds. Each
//! operation runs in four stages: validate the request shape, load wallet
//! snapshots, apply business rules, and hand the result to the store as
//! one atomic commit. Partial application is never observable.
//!
//! Failure audit: shape errors are returned before any wallet state is
//! read and leave no trace; business-rule rejections append a `Failed`
//! record so the attempt stays visible in history. Version conflicts are
//! retried internally a bounded number of times, then surfaced.
//!
//! The engine holds no global state; storage is an explicitly injected
//! [`LedgerStore`] handle and limits come from an injected
//! [`LedgerPolicy`].

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth;
use crate::types::{
    Currency, LedgerError, Money, RecordId, TransactionRecord, TransactionStatus, TransactionType,
    UserId, Wallet, WalletStatus,
};

use super::policy::LedgerPolicy;
use super::traits::LedgerStore;

/// Orchestrates ledger operations against an injected store.
///
/// Cheap to clone; clones share the same store, so one engine value can
/// serve many concurrent request handlers.
#[derive(Debug)]
pub struct LedgerEngine<S: LedgerStore> {
    store: Arc<S>,
    policy: LedgerPolicy,
}

impl<S: LedgerStore> Clone for LedgerEngine<S> {
    fn clone(&self) -> Self {
        LedgerEngine {
            store: Arc::clone(&self.store),
            policy: self.policy.clone(),
        }
    }
}

impl<S: LedgerStore> LedgerEngine<S> {
    /// Creates an engine over the given store and policy.
    pub fn new(store: Arc<S>, policy: LedgerPolicy) -> Self {
        LedgerEngine { store, policy }
    }

    /// The active policy.
    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    /// Snapshot of the user's wallet in the given currency, created
    /// lazily on first access.
    pub fn get_wallet(&self, user: UserId, currency: Currency) -> Wallet {
        self.store.load_or_create(user, currency)
    }

    /// Credits `amount` into the user's wallet.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` for a non-positive amount, `CurrencyMismatch` when
    /// the amount's currency is not the addressed wallet's,
    /// `AmountOutOfRange` above the policy cap, `WalletLocked` for a
    /// locked wallet.
    pub fn deposit(
        &self,
        user: UserId,
        currency: Currency,
        amount: Money,
        idempotency_key: Option<String>,
    ) -> Result<TransactionRecord, LedgerError> {
        self.validate_amount(&amount, currency)?;
        debug!(%user, %currency, %amount, "deposit");

        self.run(idempotency_key, |key| {
            let now = Utc::now();
            let mut wallet = self.store.load_or_create(user, currency);
            let record =
                TransactionRecord::new(wallet.id(), TransactionType::Deposit, amount, now)?
                    .with_idempotency_key(key);

            if wallet.status() != WalletStatus::Active {
                return Err(self.reject(record, LedgerError::wallet_locked(wallet.id())));
            }

            wallet.apply_delta(amount.amount(), Decimal::ZERO)?;
            wallet.note_income(&amount);
            wallet.touch(now);

            let mut record = record;
            record.mark_completed(now)?;
            self.store.commit(wallet, vec![record.clone()], None)?;
            Ok(record)
        })
    }

    /// Debits `amount` from the user's wallet.
    ///
    /// At or above the policy's password threshold the payment password
    /// must verify first; a missing or wrong password rejects the
    /// operation without touching the balance.
    ///
    /// # Errors
    ///
    /// Shape errors as for [`deposit`](Self::deposit), plus
    /// `InvalidCredentials` on password failure and `InsufficientFunds`
    /// when the available balance does not cover the amount.
    pub fn withdraw(
        &self,
        user: UserId,
        currency: Currency,
        amount: Money,
        payment_password: Option<&str>,
        idempotency_key: Option<String>,
    ) -> Result<TransactionRecord, LedgerError> {
        self.validate_amount(&amount, currency)?;
        debug!(%user, %currency, %amount, "withdraw");

        self.run(idempotency_key, |key| {
            let now = Utc::now();
            let mut wallet = self.store.load_or_create(user, currency);
            let record =
                TransactionRecord::new(wallet.id(), TransactionType::Withdraw, amount, now)?
                    .with_idempotency_key(key);

            if wallet.status() != WalletStatus::Active {
                return Err(self.reject(record, LedgerError::wallet_locked(wallet.id())));
            }
            if let Err(error) = self.check_password(&wallet, &amount, payment_password) {
                return Err(self.reject(record, error));
            }
            if !wallet.can_debit(&amount) {
                return Err(self.reject(
                    record,
                    LedgerError::insufficient_funds(wallet.available().amount(), amount.amount()),
                ));
            }

            wallet.apply_delta(-amount.amount(), Decimal::ZERO)?;
            wallet.note_expense(&amount);
            wallet.touch(now);

            let mut record = record;
            record.mark_completed(now)?;
            self.store.commit(wallet, vec![record.clone()], None)?;
            Ok(record)
        })
    }

    /// Moves `amount` from one user's wallet to another's.
    ///
    /// Writes a `TransferOut`/`TransferIn` pair sharing a correlation id;
    /// both wallet mutations and both records commit together or not at
    /// all. Returns the `TransferOut` record.
    ///
    /// # Errors
    ///
    /// `CurrencyMismatch` when the two wallet currencies differ (checked
    /// strictly, neither wallet is touched), `SelfTransfer` when source
    /// and destination are the same wallet, plus the withdraw-side error
    /// set.
    #[allow(clippy::too_many_arguments)]
    pub fn transfer(
        &self,
        source_user: UserId,
        source_currency: Currency,
        dest_user: UserId,
        dest_currency: Currency,
        amount: Money,
        payment_password: Option<&str>,
        idempotency_key: Option<String>,
    ) -> Result<TransactionRecord, LedgerError> {
        if dest_currency != source_currency {
            return Err(LedgerError::currency_mismatch(source_currency, dest_currency));
        }
        self.validate_amount(&amount, source_currency)?;
        if source_user == dest_user {
            return Err(LedgerError::SelfTransfer);
        }
        debug!(%source_user, %dest_user, %source_currency, %amount, "transfer");

        self.run(idempotency_key, |key| {
            let now = Utc::now();
            let mut source = self.store.load_or_create(source_user, source_currency);
            let mut dest = self.store.load_or_create(dest_user, dest_currency);

            let correlation_id = Uuid::new_v4();
            let record_out =
                TransactionRecord::new(source.id(), TransactionType::TransferOut, amount, now)?
                    .with_counterparty(dest.id())
                    .with_correlation_id(correlation_id)
                    .with_idempotency_key(key);

            if source.status() != WalletStatus::Active {
                return Err(self.reject(record_out, LedgerError::wallet_locked(source.id())));
            }
            if dest.status() != WalletStatus::Active {
                return Err(self.reject(record_out, LedgerError::wallet_locked(dest.id())));
            }
            if let Err(error) = self.check_password(&source, &amount, payment_password) {
                return Err(self.reject(record_out, error));
            }
            if !source.can_debit(&amount) {
                return Err(self.reject(
                    record_out,
                    LedgerError::insufficient_funds(source.available().amount(), amount.amount()),
                ));
            }

            source.apply_delta(-amount.amount(), Decimal::ZERO)?;
            source.note_expense(&amount);
            source.touch(now);

            dest.apply_delta(amount.amount(), Decimal::ZERO)?;
            dest.note_income(&amount);
            dest.touch(now);

            let mut record_out = record_out;
            record_out.mark_completed(now)?;
            let mut record_in =
                TransactionRecord::new(dest.id(), TransactionType::TransferIn, amount, now)?
                    .with_counterparty(source.id())
                    .with_correlation_id(correlation_id);
            record_in.mark_completed(now)?;

            self.store
                .commit_pair(source, dest, vec![record_out.clone(), record_in])?;
            Ok(record_out)
        })
    }

    /// Moves `amount` from the available balance into the frozen part.
    ///
    /// The total balance is unchanged.
    ///
    /// # Errors
    ///
    /// Shape errors as for [`deposit`](Self::deposit), `InsufficientFunds`
    /// when the available balance is short, `WalletLocked` for a locked
    /// wallet.
    pub fn freeze(
        &self,
        user: UserId,
        currency: Currency,
        amount: Money,
        idempotency_key: Option<String>,
    ) -> Result<TransactionRecord, LedgerError> {
        self.validate_amount(&amount, currency)?;
        debug!(%user, %currency, %amount, "freeze");

        self.run(idempotency_key, |key| {
            let now = Utc::now();
            let mut wallet = self.store.load_or_create(user, currency);
            let record = TransactionRecord::new(wallet.id(), TransactionType::Freeze, amount, now)?
                .with_idempotency_key(key);

            if wallet.status() != WalletStatus::Active {
                return Err(self.reject(record, LedgerError::wallet_locked(wallet.id())));
            }
            if amount.amount() > wallet.available().amount() {
                return Err(self.reject(
                    record,
                    LedgerError::insufficient_funds(wallet.available().amount(), amount.amount()),
                ));
            }

            wallet.apply_delta(Decimal::ZERO, amount.amount())?;
            wallet.touch(now);

            let mut record = record;
            record.mark_completed(now)?;
            self.store.commit(wallet, vec![record.clone()], None)?;
            Ok(record)
        })
    }

    /// Moves `amount` from the frozen part back to available.
    ///
    /// # Errors
    ///
    /// Shape errors as for [`deposit`](Self::deposit), `InvalidAmount`
    /// when more than the currently frozen amount is released,
    /// `WalletLocked` for a locked wallet.
    pub fn unfreeze(
        &self,
        user: UserId,
        currency: Currency,
        amount: Money,
        idempotency_key: Option<String>,
    ) -> Result<TransactionRecord, LedgerError> {
        self.validate_amount(&amount, currency)?;
        debug!(%user, %currency, %amount, "unfreeze");

        self.run(idempotency_key, |key| {
            let now = Utc::now();
            let mut wallet = self.store.load_or_create(user, currency);
            let record =
                TransactionRecord::new(wallet.id(), TransactionType::Unfreeze, amount, now)?
                    .with_idempotency_key(key);

            if wallet.status() != WalletStatus::Active {
                return Err(self.reject(record, LedgerError::wallet_locked(wallet.id())));
            }
            if amount.amount() > wallet.frozen().amount() {
                return Err(self.reject(
                    record,
                    LedgerError::invalid_amount(
                        amount.amount(),
                        "exceeds the currently frozen amount",
                    ),
                ));
            }

            wallet.apply_delta(Decimal::ZERO, -amount.amount())?;
            wallet.touch(now);

            let mut record = record;
            record.mark_completed(now)?;
            self.store.commit(wallet, vec![record.clone()], None)?;
            Ok(record)
        })
    }

    /// Compensates a completed debit record.
    ///
    /// Credits the debited wallet by the original amount, flips the
    /// original record to `Refunded` and appends a `Refund` record linked
    /// to it - all in one commit.
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` for an unknown, non-debit, non-completed
    /// or out-of-window record, `AlreadyRefunded` for a second attempt,
    /// `WalletLocked` when the wallet can no longer be credited.
    pub fn refund(
        &self,
        original_id: RecordId,
        reason: &str,
        idempotency_key: Option<String>,
    ) -> Result<TransactionRecord, LedgerError> {
        debug!(%original_id, "refund");

        self.run(idempotency_key, |key| {
            let now = Utc::now();
            let original = self.store.record(original_id).ok_or_else(|| {
                LedgerError::invalid_state_transition(original_id, "no such record")
            })?;

            if !original.tx_type.is_refundable() {
                return Err(LedgerError::invalid_state_transition(
                    original_id,
                    "only withdrawals and outgoing transfers can be refunded",
                ));
            }
            match original.status() {
                TransactionStatus::Completed => {}
                TransactionStatus::Refunded => {
                    return Err(LedgerError::already_refunded(original_id))
                }
                _ => {
                    return Err(LedgerError::invalid_state_transition(
                        original_id,
                        "only a completed record can be refunded",
                    ))
                }
            }
            if let Some(days) = self.policy.refund_window_days {
                if now - original.created_at > Duration::days(days) {
                    return Err(LedgerError::invalid_state_transition(
                        original_id,
                        "refund window has expired",
                    ));
                }
            }

            let mut wallet = self.store.get_by_id(original.wallet_id).ok_or_else(|| {
                LedgerError::invalid_state_transition(original_id, "wallet no longer exists")
            })?;
            let amount = original.amount;
            let record = TransactionRecord::new(wallet.id(), TransactionType::Refund, amount, now)?
                .with_refers_to(original_id)
                .with_idempotency_key(key)
                .with_metadata(serde_json::json!({ "reason": reason }));

            if wallet.status() != WalletStatus::Active {
                return Err(self.reject(record, LedgerError::wallet_locked(wallet.id())));
            }

            wallet.apply_delta(amount.amount(), Decimal::ZERO)?;
            wallet.note_income(&amount);
            wallet.touch(now);

            let mut record = record;
            record.mark_completed(now)?;
            self.store
                .commit(wallet, vec![record.clone()], Some(original_id))?;
            Ok(record)
        })
    }

    /// Hashes and stores the wallet's payment password.
    ///
    /// Setting a first password and rotating an existing one are the same
    /// operation.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` if the password cannot be hashed,
    /// `ConcurrentModification` if the wallet stays contended past the
    /// retry budget.
    pub fn set_payment_password(
        &self,
        user: UserId,
        currency: Currency,
        password: &str,
    ) -> Result<(), LedgerError> {
        let hash = auth::hash_payment_password(password)?;
        self.run_admin(|| {
            let mut wallet = self.store.load_or_create(user, currency);
            wallet.set_payment_password(hash.clone(), Utc::now());
            self.store.commit(wallet, vec![], None)
        })
    }

    /// Soft-locks the wallet; every subsequent balance operation is
    /// rejected until [`unlock_wallet`](Self::unlock_wallet).
    pub fn lock_wallet(&self, user: UserId, currency: Currency) -> Result<(), LedgerError> {
        warn!(%user, %currency, "locking wallet");
        self.run_admin(|| {
            let mut wallet = self.store.load_or_create(user, currency);
            wallet.lock();
            self.store.commit(wallet, vec![], None)
        })
    }

    /// Reactivates a locked wallet.
    pub fn unlock_wallet(&self, user: UserId, currency: Currency) -> Result<(), LedgerError> {
        self.run_admin(|| {
            let mut wallet = self.store.load_or_create(user, currency);
            wallet.unlock();
            self.store.commit(wallet, vec![], None)
        })
    }

    /// Shape validation shared by every amount-carrying operation.
    ///
    /// Runs before any wallet state is read; failures here leave no
    /// record.
    fn validate_amount(&self, amount: &Money, currency: Currency) -> Result<(), LedgerError> {
        if amount.currency() != currency {
            return Err(LedgerError::currency_mismatch(currency, amount.currency()));
        }
        if !amount.is_positive() {
            return Err(LedgerError::invalid_amount(
                amount.amount(),
                "amount must be positive",
            ));
        }
        if amount.amount() > self.policy.max_amount {
            return Err(LedgerError::amount_out_of_range(
                amount.amount(),
                self.policy.max_amount,
            ));
        }
        Ok(())
    }

    /// Verifies the payment password when the amount requires one.
    fn check_password(
        &self,
        wallet: &Wallet,
        amount: &Money,
        candidate: Option<&str>,
    ) -> Result<(), LedgerError> {
        if amount.amount() < self.policy.password_threshold {
            return Ok(());
        }
        let verified = match candidate {
            Some(candidate) => wallet.verify_payment_password(candidate).unwrap_or(false),
            None => false,
        };
        if verified {
            Ok(())
        } else {
            Err(LedgerError::InvalidCredentials)
        }
    }

    /// Runs one operation attempt with idempotent replay and a bounded
    /// retry on version conflicts.
    fn run<F>(
        &self,
        idempotency_key: Option<String>,
        mut attempt: F,
    ) -> Result<TransactionRecord, LedgerError>
    where
        F: FnMut(Option<String>) -> Result<TransactionRecord, LedgerError>,
    {
        let mut retries = 0;
        loop {
            if let Some(key) = idempotency_key.as_deref() {
                if let Some(existing) = self.store.find_by_idempotency_key(key) {
                    debug!(key, record = %existing.id, "idempotent replay");
                    return Ok(existing);
                }
            }
            match attempt(idempotency_key.clone()) {
                Err(LedgerError::ConcurrentModification { wallet })
                    if retries < self.policy.max_commit_retries =>
                {
                    retries += 1;
                    debug!(%wallet, retries, "version conflict, retrying");
                }
                outcome => return outcome,
            }
        }
    }

    /// Retry loop for record-less administrative commits.
    fn run_admin<F>(&self, mut attempt: F) -> Result<(), LedgerError>
    where
        F: FnMut() -> Result<(), LedgerError>,
    {
        let mut retries = 0;
        loop {
            match attempt() {
                Err(LedgerError::ConcurrentModification { .. })
                    if retries < self.policy.max_commit_retries =>
                {
                    retries += 1;
                }
                outcome => return outcome,
            }
        }
    }

    /// Finalizes a business-rule rejection: the record fails, the failure
    /// is appended for audit, the wallet stays untouched.
    fn reject(&self, mut record: TransactionRecord, error: LedgerError) -> LedgerError {
        warn!(wallet = %record.wallet_id, tx_type = %record.tx_type, %error, "operation rejected");
        if record.mark_failed(&error.to_string(), Utc::now()).is_ok() {
            self.store.append_failed(record);
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory_store::MemoryLedgerStore;
    use rust_decimal_macros::dec;

    fn engine() -> LedgerEngine<MemoryLedgerStore> {
        LedgerEngine::new(Arc::new(MemoryLedgerStore::new()), LedgerPolicy::default())
    }

    fn cny(amount: Decimal) -> Money {
        Money::new(amount, Currency::Cny).unwrap()
    }

    #[test]
    fn test_deposit_creates_wallet_and_record() {
        let engine = engine();
        let user = UserId::new();

        let record = engine
            .deposit(user, Currency::Cny, cny(dec!(100.00)), None)
            .unwrap();

        assert_eq!(record.status(), TransactionStatus::Completed);
        assert_eq!(record.tx_type, TransactionType::Deposit);

        let wallet = engine.get_wallet(user, Currency::Cny);
        assert_eq!(wallet.balance().amount(), dec!(100.00));
        assert_eq!(wallet.total_income().amount(), dec!(100.00));
        assert!(wallet.last_transaction_at().is_some());
    }

    #[test]
    fn test_deposit_rejects_non_positive_amount() {
        let engine = engine();
        let result = engine.deposit(UserId::new(), Currency::Cny, cny(dec!(0.00)), None);
        assert!(matches!(result, Err(LedgerError::InvalidAmount { .. })));
    }

    #[test]
    fn test_deposit_rejects_currency_mismatch() {
        let engine = engine();
        let user = UserId::new();
        let result = engine.deposit(user, Currency::Usd, cny(dec!(10.00)), None);
        assert!(matches!(result, Err(LedgerError::CurrencyMismatch { .. })));

        // Shape failure: no wallet was created, no record written.
        let wallet = engine.get_wallet(user, Currency::Usd);
        assert_eq!(wallet.version(), 0);
    }

    #[test]
    fn test_deposit_rejects_amount_above_cap() {
        let store = Arc::new(MemoryLedgerStore::new());
        let policy = LedgerPolicy {
            max_amount: dec!(100.00),
            ..LedgerPolicy::default()
        };
        let engine = LedgerEngine::new(store, policy);

        let result = engine.deposit(UserId::new(), Currency::Cny, cny(dec!(100.01)), None);
        assert!(matches!(result, Err(LedgerError::AmountOutOfRange { .. })));
    }

    #[test]
    fn test_withdraw_round_trip_restores_balance() {
        let engine = engine();
        let user = UserId::new();

        engine
            .deposit(user, Currency::Cny, cny(dec!(100.00)), None)
            .unwrap();
        engine
            .withdraw(user, Currency::Cny, cny(dec!(100.00)), None, None)
            .unwrap();

        let wallet = engine.get_wallet(user, Currency::Cny);
        assert_eq!(wallet.balance().amount(), dec!(0.00));
        assert_eq!(wallet.total_income().amount(), dec!(100.00));
        assert_eq!(wallet.total_expense().amount(), dec!(100.00));
    }

    #[test]
    fn test_withdraw_insufficient_funds_writes_failed_record() {
        let engine = engine();
        let user = UserId::new();

        engine
            .deposit(user, Currency::Cny, cny(dec!(100.00)), None)
            .unwrap();
        let result = engine.withdraw(user, Currency::Cny, cny(dec!(150.00)), None, None);
        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));

        let wallet = engine.get_wallet(user, Currency::Cny);
        assert_eq!(wallet.balance().amount(), dec!(100.00));

        // The attempt stays auditable.
        let records = engine.store.wallet_records(wallet.id());
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].status(), TransactionStatus::Failed);
        assert!(records[1].failure_reason().unwrap().contains("insufficient"));
    }

    #[test]
    fn test_withdraw_above_threshold_requires_password() {
        let engine = engine();
        let user = UserId::new();
        engine
            .deposit(user, Currency::Cny, cny(dec!(5000.00)), None)
            .unwrap();

        // No password set and none supplied.
        let result = engine.withdraw(user, Currency::Cny, cny(dec!(2000.00)), None, None);
        assert!(matches!(result, Err(LedgerError::InvalidCredentials)));

        engine
            .set_payment_password(user, Currency::Cny, "314159")
            .unwrap();

        let wrong = engine.withdraw(
            user,
            Currency::Cny,
            cny(dec!(2000.00)),
            Some("271828"),
            None,
        );
        assert!(matches!(wrong, Err(LedgerError::InvalidCredentials)));

        // Balance untouched by the failed attempts.
        assert_eq!(
            engine.get_wallet(user, Currency::Cny).balance().amount(),
            dec!(5000.00)
        );

        engine
            .withdraw(
                user,
                Currency::Cny,
                cny(dec!(2000.00)),
                Some("314159"),
                None,
            )
            .unwrap();
        assert_eq!(
            engine.get_wallet(user, Currency::Cny).balance().amount(),
            dec!(3000.00)
        );
    }

    #[test]
    fn test_withdraw_below_threshold_needs_no_password() {
        let engine = engine();
        let user = UserId::new();
        engine
            .deposit(user, Currency::Cny, cny(dec!(100.00)), None)
            .unwrap();

        let result = engine.withdraw(user, Currency::Cny, cny(dec!(50.00)), None, None);
        assert!(result.is_ok());
    }

    #[test]
    fn test_transfer_moves_funds_and_links_records() {
        let engine = engine();
        let alice = UserId::new();
        let bob = UserId::new();

        engine
            .deposit(alice, Currency::Cny, cny(dec!(50.00)), None)
            .unwrap();
        let record_out = engine
            .transfer(
                alice,
                Currency::Cny,
                bob,
                Currency::Cny,
                cny(dec!(10.00)),
                None,
                None,
            )
            .unwrap();

        let alice_wallet = engine.get_wallet(alice, Currency::Cny);
        let bob_wallet = engine.get_wallet(bob, Currency::Cny);
        assert_eq!(alice_wallet.balance().amount(), dec!(40.00));
        assert_eq!(bob_wallet.balance().amount(), dec!(10.00));

        assert_eq!(record_out.tx_type, TransactionType::TransferOut);
        assert_eq!(record_out.counterparty, Some(bob_wallet.id()));

        // The paired record shares the correlation id.
        let bob_records = engine.store.wallet_records(bob_wallet.id());
        assert_eq!(bob_records.len(), 1);
        assert_eq!(bob_records[0].tx_type, TransactionType::TransferIn);
        assert_eq!(bob_records[0].correlation_id, record_out.correlation_id);
        assert_eq!(bob_records[0].counterparty, Some(alice_wallet.id()));
    }

    #[test]
    fn test_transfer_conserves_total_balance() {
        let engine = engine();
        let alice = UserId::new();
        let bob = UserId::new();

        engine
            .deposit(alice, Currency::Cny, cny(dec!(80.00)), None)
            .unwrap();
        engine
            .deposit(bob, Currency::Cny, cny(dec!(20.00)), None)
            .unwrap();

        engine
            .transfer(
                alice,
                Currency::Cny,
                bob,
                Currency::Cny,
                cny(dec!(30.00)),
                None,
                None,
            )
            .unwrap();

        let total = engine.get_wallet(alice, Currency::Cny).balance().amount()
            + engine.get_wallet(bob, Currency::Cny).balance().amount();
        assert_eq!(total, dec!(100.00));
    }

    #[test]
    fn test_transfer_currency_mismatch_touches_nothing() {
        let engine = engine();
        let alice = UserId::new();
        let bob = UserId::new();

        engine
            .deposit(alice, Currency::Cny, cny(dec!(50.00)), None)
            .unwrap();

        let result = engine.transfer(
            alice,
            Currency::Cny,
            bob,
            Currency::Usd,
            cny(dec!(10.00)),
            None,
            None,
        );
        assert!(matches!(result, Err(LedgerError::CurrencyMismatch { .. })));

        assert_eq!(
            engine.get_wallet(alice, Currency::Cny).balance().amount(),
            dec!(50.00)
        );
        // Bob's USD wallet was never even created.
        assert!(engine.store.get(bob, Currency::Usd).is_none());
    }

    #[test]
    fn test_transfer_to_self_is_rejected() {
        let engine = engine();
        let user = UserId::new();
        engine
            .deposit(user, Currency::Cny, cny(dec!(50.00)), None)
            .unwrap();

        let result = engine.transfer(
            user,
            Currency::Cny,
            user,
            Currency::Cny,
            cny(dec!(10.00)),
            None,
            None,
        );
        assert!(matches!(result, Err(LedgerError::SelfTransfer)));
    }

    #[test]
    fn test_freeze_unfreeze_round_trip() {
        let engine = engine();
        let user = UserId::new();
        engine
            .deposit(user, Currency::Cny, cny(dec!(100.00)), None)
            .unwrap();

        engine
            .freeze(user, Currency::Cny, cny(dec!(40.00)), None)
            .unwrap();
        let wallet = engine.get_wallet(user, Currency::Cny);
        assert_eq!(wallet.balance().amount(), dec!(100.00));
        assert_eq!(wallet.frozen().amount(), dec!(40.00));
        assert_eq!(wallet.available().amount(), dec!(60.00));

        engine
            .unfreeze(user, Currency::Cny, cny(dec!(40.00)), None)
            .unwrap();
        let wallet = engine.get_wallet(user, Currency::Cny);
        assert_eq!(wallet.balance().amount(), dec!(100.00));
        assert_eq!(wallet.frozen().amount(), dec!(0.00));
        assert_eq!(wallet.available().amount(), dec!(100.00));
    }

    #[test]
    fn test_freeze_more_than_available_fails() {
        let engine = engine();
        let user = UserId::new();
        engine
            .deposit(user, Currency::Cny, cny(dec!(100.00)), None)
            .unwrap();
        engine
            .freeze(user, Currency::Cny, cny(dec!(80.00)), None)
            .unwrap();

        let result = engine.freeze(user, Currency::Cny, cny(dec!(30.00)), None);
        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
    }

    #[test]
    fn test_unfreeze_more_than_frozen_fails() {
        let engine = engine();
        let user = UserId::new();
        engine
            .deposit(user, Currency::Cny, cny(dec!(100.00)), None)
            .unwrap();
        engine
            .freeze(user, Currency::Cny, cny(dec!(20.00)), None)
            .unwrap();

        let result = engine.unfreeze(user, Currency::Cny, cny(dec!(30.00)), None);
        assert!(matches!(result, Err(LedgerError::InvalidAmount { .. })));
    }

    #[test]
    fn test_frozen_funds_cannot_be_withdrawn() {
        let engine = engine();
        let user = UserId::new();
        engine
            .deposit(user, Currency::Cny, cny(dec!(100.00)), None)
            .unwrap();
        engine
            .freeze(user, Currency::Cny, cny(dec!(70.00)), None)
            .unwrap();

        let result = engine.withdraw(user, Currency::Cny, cny(dec!(50.00)), None, None);
        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
    }

    #[test]
    fn test_idempotent_deposit_applies_once() {
        let engine = engine();
        let user = UserId::new();

        let first = engine
            .deposit(
                user,
                Currency::Cny,
                cny(dec!(25.00)),
                Some("dep-1".to_string()),
            )
            .unwrap();
        let second = engine
            .deposit(
                user,
                Currency::Cny,
                cny(dec!(25.00)),
                Some("dep-1".to_string()),
            )
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(
            engine.get_wallet(user, Currency::Cny).balance().amount(),
            dec!(25.00)
        );
    }

    #[test]
    fn test_refund_restores_balance_and_links_records() {
        let engine = engine();
        let user = UserId::new();
        engine
            .deposit(user, Currency::Cny, cny(dec!(100.00)), None)
            .unwrap();
        let withdrawal = engine
            .withdraw(user, Currency::Cny, cny(dec!(60.00)), None, None)
            .unwrap();

        let refund = engine.refund(withdrawal.id, "goods returned", None).unwrap();
        assert_eq!(refund.tx_type, TransactionType::Refund);
        assert_eq!(refund.refers_to, Some(withdrawal.id));
        assert_eq!(refund.metadata["reason"], "goods returned");

        let wallet = engine.get_wallet(user, Currency::Cny);
        assert_eq!(wallet.balance().amount(), dec!(100.00));

        // The original is now marked refunded.
        let original = engine.store.record(withdrawal.id).unwrap();
        assert_eq!(original.status(), TransactionStatus::Refunded);
    }

    #[test]
    fn test_refund_twice_fails() {
        let engine = engine();
        let user = UserId::new();
        engine
            .deposit(user, Currency::Cny, cny(dec!(100.00)), None)
            .unwrap();
        let withdrawal = engine
            .withdraw(user, Currency::Cny, cny(dec!(60.00)), None, None)
            .unwrap();

        engine.refund(withdrawal.id, "first", None).unwrap();
        let second = engine.refund(withdrawal.id, "second", None);
        assert!(matches!(second, Err(LedgerError::AlreadyRefunded { .. })));

        // Only one compensation applied.
        assert_eq!(
            engine.get_wallet(user, Currency::Cny).balance().amount(),
            dec!(100.00)
        );
    }

    #[test]
    fn test_refund_rejects_credit_records() {
        let engine = engine();
        let user = UserId::new();
        let deposit = engine
            .deposit(user, Currency::Cny, cny(dec!(100.00)), None)
            .unwrap();

        let result = engine.refund(deposit.id, "nope", None);
        assert!(matches!(
            result,
            Err(LedgerError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_refund_unknown_record_fails() {
        let engine = engine();
        let result = engine.refund(RecordId::new(), "nope", None);
        assert!(matches!(
            result,
            Err(LedgerError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_locked_wallet_rejects_operations() {
        let engine = engine();
        let user = UserId::new();
        engine
            .deposit(user, Currency::Cny, cny(dec!(100.00)), None)
            .unwrap();
        engine.lock_wallet(user, Currency::Cny).unwrap();

        let deposit = engine.deposit(user, Currency::Cny, cny(dec!(10.00)), None);
        assert!(matches!(deposit, Err(LedgerError::WalletLocked { .. })));

        let withdraw = engine.withdraw(user, Currency::Cny, cny(dec!(10.00)), None, None);
        assert!(matches!(withdraw, Err(LedgerError::WalletLocked { .. })));

        engine.unlock_wallet(user, Currency::Cny).unwrap();
        assert!(engine
            .deposit(user, Currency::Cny, cny(dec!(10.00)), None)
            .is_ok());
    }

    #[test]
    fn test_wallets_per_currency_are_independent() {
        let engine = engine();
        let user = UserId::new();

        engine
            .deposit(user, Currency::Cny, cny(dec!(100.00)), None)
            .unwrap();
        engine
            .deposit(
                user,
                Currency::Usd,
                Money::new(dec!(40.00), Currency::Usd).unwrap(),
                None,
            )
            .unwrap();

        assert_eq!(
            engine.get_wallet(user, Currency::Cny).balance().amount(),
            dec!(100.00)
        );
        assert_eq!(
            engine.get_wallet(user, Currency::Usd).balance().amount(),
            dec!(40.00)
        );
    }
}
