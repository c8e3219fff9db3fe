//! In-process ledger store.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDate;

use tallyflow_core::ledger::LedgerEntry;
use tallyflow_shared::types::TransactionId;

use crate::error::LedgerStoreError;
use crate::store::{InsertOutcome, LedgerStore, day_bounds};

#[derive(Debug, Default)]
struct State {
    entries: Vec<LedgerEntry>,
    failing_inserts: usize,
    failing_reads: usize,
    unreachable: bool,
}

/// [`LedgerStore`] kept in memory, with failure injection for tests.
///
/// Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of every stored entry in insertion order.
    #[must_use]
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.lock().entries.clone()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes the next `count` inserts fail.
    pub fn fail_next_inserts(&self, count: usize) {
        self.lock().failing_inserts = count;
    }

    /// Makes the next `count` reads (`exists`, `list*`) fail.
    pub fn fail_next_reads(&self, count: usize) {
        self.lock().failing_reads = count;
    }

    /// Toggles whether `ping` fails.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    fn take_read_failure(state: &mut State) -> Result<(), LedgerStoreError> {
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(LedgerStoreError::Query("injected read failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn exists(&self, transaction_id: TransactionId) -> Result<bool, LedgerStoreError> {
        let mut state = self.lock();
        Self::take_read_failure(&mut state)?;
        Ok(state
            .entries
            .iter()
            .any(|e| e.transaction_id == transaction_id))
    }

    async fn insert(&self, entry: &LedgerEntry) -> Result<InsertOutcome, LedgerStoreError> {
        let mut state = self.lock();
        if state.failing_inserts > 0 {
            state.failing_inserts -= 1;
            return Err(LedgerStoreError::Query("injected insert failure".to_string()));
        }
        if state
            .entries
            .iter()
            .any(|e| e.transaction_id == entry.transaction_id)
        {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        state.entries.push(entry.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn list_by_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<LedgerEntry>, LedgerStoreError> {
        let mut state = self.lock();
        Self::take_read_failure(&mut state)?;
        let mut entries: Vec<LedgerEntry> = state
            .entries
            .iter()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    async fn list(&self, day: Option<NaiveDate>) -> Result<Vec<LedgerEntry>, LedgerStoreError> {
        let mut state = self.lock();
        Self::take_read_failure(&mut state)?;
        let bounds = day.map(day_bounds);
        let mut entries: Vec<LedgerEntry> = state
            .entries
            .iter()
            .filter(|e| bounds.is_none_or(|(start, end)| e.created_at >= start && e.created_at < end))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    async fn ping(&self) -> Result<(), LedgerStoreError> {
        if self.lock().unreachable {
            return Err(LedgerStoreError::Connection("store unreachable".to_string()));
        }
        Ok(())
    }
}
