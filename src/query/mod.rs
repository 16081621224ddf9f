//! Read-only reporting over committed transaction records.
//!
//! The query layer never mutates anything and only observes committed
//! state: it reads through the same [`LedgerStore`] handle the engine
//! commits through, so a partially-applied operation is never visible.
//!
//! - `history` - filtered, cursor-paginated record listing, newest first
//! - `summary` - per-type aggregation over a time period

use std::sync::Arc;

use crate::core::traits::LedgerStore;

pub mod history;
pub mod summary;

pub use history::{FlowDirection, HistoryFilter, HistoryPage};
pub use summary::{Period, TypeTotals, WalletSummary};

/// Read-only view over a ledger store.
#[derive(Debug)]
pub struct LedgerQuery<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> Clone for LedgerQuery<S> {
    fn clone(&self) -> Self {
        LedgerQuery {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LedgerStore> LedgerQuery<S> {
    /// Creates a query view over the given store.
    pub fn new(store: Arc<S>) -> Self {
        LedgerQuery { store }
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }
}
