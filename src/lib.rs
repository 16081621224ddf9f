//! Wallet Ledger Library
//! # Overview
//!
//! This library implements a per-user wallet and transaction ledger:
//! monetary balances with deposits, withdrawals, freezes and peer-to-peer
//! transfers under strict consistency, idempotent transaction records and
//! hard currency-matching rules.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Money, Wallet, TransactionRecord, errors)
//! - [`auth`] - Payment-password hashing
//! - [`core`] - Business logic components:
//!   - [`core::engine`] - Ledger operation orchestration
//!   - [`core::traits`] - The repository seam storage plugs into
//!   - [`core::memory_store`] - Thread-safe in-memory storage
//! - [`query`] - Read-only history and summary reporting
//!
//! # Operations
//!
//! The engine supports six ledger operations:
//!
//! - **Deposit**: Credit funds into a wallet
//! - **Withdraw**: Debit funds (payment password above a threshold)
//! - **Transfer**: Move funds between two same-currency wallets as a
//!   linked record pair committed atomically
//! - **Freeze** / **Unfreeze**: Move funds between the available and
//!   frozen parts of a balance without changing its total
//! - **Refund**: Compensate a completed debit with a linked credit
//!
//! # Consistency
//!
//! Every operation commits its wallet mutation and records as one atomic
//! unit through the [`core::traits::LedgerStore`] seam. Wallets carry an
//! optimistic version stamp; conflicting commits are retried a bounded
//! number of times and then surface
//! [`types::LedgerError::ConcurrentModification`]. A caller-supplied
//! idempotency key makes retries safe: the original completed record is
//! returned instead of applying the operation twice.

// Module declarations
pub mod auth;
pub mod core;
pub mod query;
pub mod types;

pub use crate::core::{LedgerEngine, LedgerPolicy, LedgerStore, MemoryLedgerStore};
pub use query::{
    FlowDirection, HistoryFilter, HistoryPage, LedgerQuery, Period, TypeTotals, WalletSummary,
};
pub use types::{
    Currency, LedgerError, Money, RecordId, TransactionRecord, TransactionStatus, TransactionType,
    UserId, Wallet, WalletId, WalletStatus,
};
