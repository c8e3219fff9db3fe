//! Ledger store capability.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use tallyflow_core::ledger::LedgerEntry;
use tallyflow_shared::types::TransactionId;

use crate::error::LedgerStoreError;

/// Result of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The entry was written.
    Inserted,
    /// An entry for the same transaction already existed; nothing was written.
    AlreadyPresent,
}

/// Append-only ledger storage.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Returns true if an entry for `transaction_id` exists.
    async fn exists(&self, transaction_id: TransactionId) -> Result<bool, LedgerStoreError>;

    /// Writes `entry` unless one for its transaction already exists.
    async fn insert(&self, entry: &LedgerEntry) -> Result<InsertOutcome, LedgerStoreError>;

    /// Entries posted on `account_id`, oldest first.
    async fn list_by_account(&self, account_id: &str)
    -> Result<Vec<LedgerEntry>, LedgerStoreError>;

    /// Entries created on `day` (UTC), or all entries when `None`, oldest first.
    async fn list(&self, day: Option<NaiveDate>) -> Result<Vec<LedgerEntry>, LedgerStoreError>;

    /// Round-trips a command to the store.
    async fn ping(&self) -> Result<(), LedgerStoreError>;
}

/// Half-open `[start, end)` UTC bounds of `day`.
#[must_use]
pub fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day.and_time(chrono::NaiveTime::MIN).and_utc();
    (start, start + chrono::Duration::days(1))
}
