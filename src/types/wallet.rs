//! Wallet entity for the ledger.
//!
//! A wallet is the per-(user, currency) balance record. The balance is the
//! wallet's total value; `frozen` is the part of it that cannot be spent,
//! and `available` is the difference. Invariants, enforced on every
//! mutation:
//!
//! - `balance >= frozen >= 0`
//! - currency is immutable after creation
//! - balance fields change only through [`Wallet::apply_delta`], which the
//!   ledger engine calls inside an atomic commit
//!
//! Wallets are never deleted; the `Locked` status is the soft-delete that
//! preserves the audit trail.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::LedgerError;
use super::money::{Currency, Money};
use super::{UserId, WalletId};
use crate::auth;

/// Wallet lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletStatus {
    /// Accepting all operations
    Active,
    /// Soft-locked; every balance operation is rejected
    Locked,
}

/// Per-user, per-currency balance record.
///
/// Cheap to clone; the store hands out clones as snapshots and the
/// `version` stamp detects when a snapshot has gone stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    id: WalletId,
    user: UserId,
    currency: Currency,
    balance: Money,
    frozen: Money,
    status: WalletStatus,
    payment_password_hash: Option<String>,
    password_set_at: Option<DateTime<Utc>>,
    total_income: Money,
    total_expense: Money,
    last_transaction_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    version: u64,
}

impl Wallet {
    /// Creates an empty active wallet for the given owner and currency.
    pub fn new(user: UserId, currency: Currency) -> Self {
        Wallet {
            id: WalletId::new(),
            user,
            currency,
            balance: Money::zero(currency),
            frozen: Money::zero(currency),
            status: WalletStatus::Active,
            payment_password_hash: None,
            password_set_at: None,
            total_income: Money::zero(currency),
            total_expense: Money::zero(currency),
            last_transaction_at: None,
            created_at: Utc::now(),
            version: 0,
        }
    }

    /// The wallet id.
    pub fn id(&self) -> WalletId {
        self.id
    }

    /// The owning user.
    pub fn user(&self) -> UserId {
        self.user
    }

    /// The wallet currency, fixed at creation.
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Total balance, frozen part included.
    pub fn balance(&self) -> Money {
        self.balance
    }

    /// The frozen part of the balance.
    pub fn frozen(&self) -> Money {
        self.frozen
    }

    /// The spendable amount: balance minus frozen.
    pub fn available(&self) -> Money {
        Money::from_raw(self.balance.amount() - self.frozen.amount(), self.currency)
    }

    /// Current lifecycle status.
    pub fn status(&self) -> WalletStatus {
        self.status
    }

    /// Lifetime credited total.
    pub fn total_income(&self) -> Money {
        self.total_income
    }

    /// Lifetime debited total.
    pub fn total_expense(&self) -> Money {
        self.total_expense
    }

    /// When the last completed operation touched this wallet.
    pub fn last_transaction_at(&self) -> Option<DateTime<Utc>> {
        self.last_transaction_at
    }

    /// When the wallet was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Optimistic-concurrency stamp; bumped by the store on every commit.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// True once a payment password has been set.
    pub fn has_payment_password(&self) -> bool {
        self.payment_password_hash.is_some()
    }

    /// When the payment password was last set.
    pub fn password_set_at(&self) -> Option<DateTime<Utc>> {
        self.password_set_at
    }

    /// Whether the wallet can currently pay out `amount`.
    ///
    /// True only for an active wallet whose available balance covers the
    /// amount; a different currency never debits.
    pub fn can_debit(&self, amount: &Money) -> bool {
        self.status == WalletStatus::Active
            && amount
                .compare(&self.available())
                .is_ok_and(|ordering| ordering != Ordering::Greater)
    }

    /// Applies balance and frozen deltas in one step.
    ///
    /// Engine-internal: always called inside an atomic store commit.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::WalletLocked`] unless the wallet is active,
    /// [`LedgerError::InsufficientFunds`] if the resulting balance or
    /// frozen amount would go negative or frozen would exceed balance,
    /// and [`LedgerError::AmountOutOfRange`] on arithmetic overflow.
    pub(crate) fn apply_delta(
        &mut self,
        balance_delta: Decimal,
        frozen_delta: Decimal,
    ) -> Result<(), LedgerError> {
        if self.status != WalletStatus::Active {
            return Err(LedgerError::wallet_locked(self.id));
        }

        let new_balance = self
            .balance
            .amount()
            .checked_add(balance_delta)
            .ok_or_else(|| LedgerError::amount_out_of_range(balance_delta, Decimal::MAX))?;
        let new_frozen = self
            .frozen
            .amount()
            .checked_add(frozen_delta)
            .ok_or_else(|| LedgerError::amount_out_of_range(frozen_delta, Decimal::MAX))?;

        if new_balance.is_sign_negative() {
            return Err(LedgerError::insufficient_funds(
                self.available().amount(),
                balance_delta.abs(),
            ));
        }
        if new_frozen.is_sign_negative() || new_frozen > new_balance {
            return Err(LedgerError::insufficient_funds(
                self.available().amount(),
                frozen_delta.abs(),
            ));
        }

        self.balance = Money::from_raw(new_balance, self.currency);
        self.frozen = Money::from_raw(new_frozen, self.currency);
        Ok(())
    }

    /// Adds a completed credit to the lifetime income counter.
    pub(crate) fn note_income(&mut self, amount: &Money) {
        self.total_income =
            Money::from_raw(self.total_income.amount() + amount.amount(), self.currency);
    }

    /// Adds a completed debit to the lifetime expense counter.
    pub(crate) fn note_expense(&mut self, amount: &Money) {
        self.total_expense =
            Money::from_raw(self.total_expense.amount() + amount.amount(), self.currency);
    }

    /// Stamps the last-transaction timestamp.
    pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
        self.last_transaction_at = Some(at);
    }

    /// Stores a new payment-password hash.
    ///
    /// Set-once-then-rotatable: replacing an existing hash is allowed.
    pub(crate) fn set_payment_password(&mut self, hash: String, at: DateTime<Utc>) {
        self.payment_password_hash = Some(hash);
        self.password_set_at = Some(at);
    }

    /// Verifies a payment-password candidate against the stored hash.
    ///
    /// Returns `Ok(false)` for a wrong password or when no password has
    /// been set; never mutates state.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidCredentials`] only when the stored
    /// hash itself cannot be parsed.
    pub fn verify_payment_password(&self, candidate: &str) -> Result<bool, LedgerError> {
        match &self.payment_password_hash {
            Some(hash) => Ok(auth::verify_payment_password(candidate, hash)?),
            None => Ok(false),
        }
    }

    /// Soft-locks the wallet.
    pub(crate) fn lock(&mut self) {
        self.status = WalletStatus::Locked;
    }

    /// Reactivates a locked wallet.
    pub(crate) fn unlock(&mut self) {
        self.status = WalletStatus::Active;
    }

    /// Store-internal version bump on commit.
    pub(crate) fn bump_version(&mut self) {
        self.version += 1;
    }
}
