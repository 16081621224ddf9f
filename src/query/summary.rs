//! Per-type aggregation over a wallet's history.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::traits::LedgerStore;
use crate::types::{Currency, TransactionStatus, TransactionType, UserId};

use super::LedgerQuery;

/// Half-open time period `[since, until)`; either bound may be absent.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Period {
    /// Inclusive start.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive end.
    pub until: Option<DateTime<Utc>>,
}

impl Period {
    fn contains(&self, at: DateTime<Utc>) -> bool {
        if let Some(since) = self.since {
            if at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if at >= until {
                return false;
            }
        }
        true
    }
}

/// Count and total amount for one transaction type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeTotals {
    /// Number of completed records.
    pub count: u64,
    /// Sum of their amounts.
    pub total: Decimal,
}

/// Aggregate totals over a wallet's completed records in a period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSummary {
    /// The wallet currency all totals are denominated in.
    pub currency: Currency,
    /// Totals per transaction type; types with no records are absent.
    pub by_type: BTreeMap<TransactionType, TypeTotals>,
    /// Sum over the income types.
    pub total_income: Decimal,
    /// Sum over the expense types.
    pub total_expense: Decimal,
    /// Income minus expense.
    pub net_change: Decimal,
}

impl WalletSummary {
    fn empty(currency: Currency) -> Self {
        WalletSummary {
            currency,
            by_type: BTreeMap::new(),
            total_income: Decimal::ZERO,
            total_expense: Decimal::ZERO,
            net_change: Decimal::ZERO,
        }
    }
}

impl<S: LedgerStore> LedgerQuery<S> {
    /// Aggregates the wallet's completed records within `period`.
    ///
    /// Only records that reached `Completed` count: failed attempts and
    /// pending records never show up in totals, and a refunded original
    /// is compensated by its refund record rather than erased.
    pub fn summary(&self, user: UserId, currency: Currency, period: &Period) -> WalletSummary {
        let Some(wallet) = self.store().get(user, currency) else {
            return WalletSummary::empty(currency);
        };

        let mut summary = WalletSummary::empty(currency);
        for record in self.store().wallet_records(wallet.id()) {
            let counted = matches!(
                record.status(),
                TransactionStatus::Completed | TransactionStatus::Refunded
            );
            if !counted || !period.contains(record.created_at) {
                continue;
            }

            let totals = summary.by_type.entry(record.tx_type).or_default();
            totals.count += 1;
            totals.total += record.amount.amount();

            if record.tx_type.is_income() {
                summary.total_income += record.amount.amount();
            } else if record.tx_type.is_expense() {
                summary.total_expense += record.amount.amount();
            }
        }
        summary.net_change = summary.total_income - summary.total_expense;
        summary
    }
}
