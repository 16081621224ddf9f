//! Filtered, cursor-paginated transaction history.
//!
//! History is returned newest first and is restartable: each page names
//! the record to continue after, so a caller can walk an arbitrarily long
//! history in bounded slices even while new records are appended ahead of
//! its cursor.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::traits::LedgerStore;
use crate::types::{Currency, RecordId, TransactionRecord, TransactionStatus, TransactionType, UserId};

use super::LedgerQuery;

/// Income/expense classification filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowDirection {
    /// Credits: deposits, incoming transfers, refunds
    Income,
    /// Debits: withdrawals, outgoing transfers
    Expense,
}

/// Combinable predicates over transaction records.
///
/// Every field is optional; an empty filter matches everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryFilter {
    /// Restrict to these transaction types.
    pub types: Option<Vec<TransactionType>>,
    /// Restrict to one lifecycle status.
    pub status: Option<TransactionStatus>,
    /// Restrict to income or expense records.
    pub flow: Option<FlowDirection>,
    /// Inclusive lower bound on the amount.
    pub min_amount: Option<Decimal>,
    /// Inclusive upper bound on the amount.
    pub max_amount: Option<Decimal>,
    /// Only records created at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Only records created strictly before this instant.
    pub until: Option<DateTime<Utc>>,
}

impl HistoryFilter {
    /// Whether a record satisfies every set predicate.
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        if let Some(types) = &self.types {
            if !types.contains(&record.tx_type) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if record.status() != status {
                return false;
            }
        }
        if let Some(flow) = self.flow {
            let matches_flow = match flow {
                FlowDirection::Income => record.tx_type.is_income(),
                FlowDirection::Expense => record.tx_type.is_expense(),
            };
            if !matches_flow {
                return false;
            }
        }
        if let Some(min) = self.min_amount {
            if record.amount.amount() < min {
                return false;
            }
        }
        if let Some(max) = self.max_amount {
            if record.amount.amount() > max {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if record.created_at >= until {
                return false;
            }
        }
        true
    }
}

/// One slice of a wallet's history, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPage {
    /// The matching records of this slice.
    pub records: Vec<TransactionRecord>,
    /// Pass back to continue after the last record of this page; `None`
    /// when the history is exhausted.
    pub next_cursor: Option<RecordId>,
}

impl<S: LedgerStore> LedgerQuery<S> {
    /// Returns one page of the wallet's history, newest first.
    ///
    /// `cursor` is the id returned by the previous page; records at and
    /// before it (in newest-first order) are skipped. A wallet that does
    /// not exist yet has an empty history.
    pub fn history(
        &self,
        user: UserId,
        currency: Currency,
        filter: &HistoryFilter,
        cursor: Option<RecordId>,
        limit: usize,
    ) -> HistoryPage {
        let Some(wallet) = self.store().get(user, currency) else {
            return HistoryPage {
                records: Vec::new(),
                next_cursor: None,
            };
        };

        let records = self.store().wallet_records(wallet.id());
        let mut newest_first = records.into_iter().rev();

        // Resume strictly after the cursor record.
        if let Some(cursor) = cursor {
            for record in newest_first.by_ref() {
                if record.id == cursor {
                    break;
                }
            }
        }

        let mut matching = newest_first.filter(|record| filter.matches(record));
        let page: Vec<TransactionRecord> = matching.by_ref().take(limit).collect();
        let has_more = matching.next().is_some();

        let next_cursor = if has_more {
            page.last().map(|record| record.id)
        } else {
            None
        };
        HistoryPage {
            records: page,
            next_cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LedgerEngine, LedgerPolicy, MemoryLedgerStore};
    use crate::types::Money;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn setup() -> (LedgerEngine<MemoryLedgerStore>, LedgerQuery<MemoryLedgerStore>, UserId) {
        let store = Arc::new(MemoryLedgerStore::new());
        let engine = LedgerEngine::new(Arc::clone(&store), LedgerPolicy::default());
        let query = LedgerQuery::new(store);
        (engine, query, UserId::new())
    }

    fn cny(amount: Decimal) -> Money {
        Money::new(amount, Currency::Cny).unwrap()
    }

    #[test]
    fn test_history_is_newest_first() {
        let (engine, query, user) = setup();
        engine.deposit(user, Currency::Cny, cny(dec!(10.00)), None).unwrap();
        engine.deposit(user, Currency::Cny, cny(dec!(20.00)), None).unwrap();
        engine.withdraw(user, Currency::Cny, cny(dec!(5.00)), None, None).unwrap();

        let page = query.history(user, Currency::Cny, &HistoryFilter::default(), None, 10);
        assert_eq!(page.records.len(), 3);
        assert_eq!(page.records[0].tx_type, TransactionType::Withdraw);
        assert_eq!(page.records[1].amount.amount(), dec!(20.00));
        assert_eq!(page.records[2].amount.amount(), dec!(10.00));
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_history_of_unknown_wallet_is_empty() {
        let (_, query, user) = setup();
        let page = query.history(user, Currency::Cny, &HistoryFilter::default(), None, 10);
        assert!(page.records.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_history_pagination_resumes_after_cursor() {
        let (engine, query, user) = setup();
        for minor in 1..=5i64 {
            engine
                .deposit(user, Currency::Cny, cny(Decimal::new(minor, 2)), None)
                .unwrap();
        }

        let first = query.history(user, Currency::Cny, &HistoryFilter::default(), None, 2);
        assert_eq!(first.records.len(), 2);
        let cursor = first.next_cursor.expect("more pages expected");

        let second = query.history(user, Currency::Cny, &HistoryFilter::default(), Some(cursor), 2);
        assert_eq!(second.records.len(), 2);
        // No overlap between pages.
        assert!(second
            .records
            .iter()
            .all(|record| first.records.iter().all(|prev| prev.id != record.id)));

        let cursor = second.next_cursor.expect("one page left");
        let third = query.history(user, Currency::Cny, &HistoryFilter::default(), Some(cursor), 2);
        assert_eq!(third.records.len(), 1);
        assert!(third.next_cursor.is_none());
    }

    #[test]
    fn test_history_filters_by_type_and_flow() {
        let (engine, query, user) = setup();
        engine.deposit(user, Currency::Cny, cny(dec!(100.00)), None).unwrap();
        engine.withdraw(user, Currency::Cny, cny(dec!(30.00)), None, None).unwrap();
        engine.freeze(user, Currency::Cny, cny(dec!(10.00)), None).unwrap();

        let deposits_only = HistoryFilter {
            types: Some(vec![TransactionType::Deposit]),
            ..HistoryFilter::default()
        };
        let page = query.history(user, Currency::Cny, &deposits_only, None, 10);
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].tx_type, TransactionType::Deposit);

        let expenses = HistoryFilter {
            flow: Some(FlowDirection::Expense),
            ..HistoryFilter::default()
        };
        let page = query.history(user, Currency::Cny, &expenses, None, 10);
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].tx_type, TransactionType::Withdraw);
    }

    #[test]
    fn test_history_filters_by_status_and_amount() {
        let (engine, query, user) = setup();
        engine.deposit(user, Currency::Cny, cny(dec!(100.00)), None).unwrap();
        // A failed attempt shows up only under the Failed status filter.
        let _ = engine.withdraw(user, Currency::Cny, cny(dec!(500.00)), None, None);

        let failed = HistoryFilter {
            status: Some(TransactionStatus::Failed),
            ..HistoryFilter::default()
        };
        let page = query.history(user, Currency::Cny, &failed, None, 10);
        assert_eq!(page.records.len(), 1);
        assert!(page.records[0].failure_reason().is_some());

        let large = HistoryFilter {
            min_amount: Some(dec!(200.00)),
            ..HistoryFilter::default()
        };
        let page = query.history(user, Currency::Cny, &large, None, 10);
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].amount.amount(), dec!(500.00));
    }
}
