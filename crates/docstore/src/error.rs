//! Ledger store error types.

use thiserror::Error;

/// Errors raised by ledger store adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerStoreError {
    /// Could not reach the store.
    #[error("Ledger store connection error: {0}")]
    Connection(String),

    /// The store rejected or failed an operation.
    #[error("Ledger store query error: {0}")]
    Query(String),

    /// An operation did not finish before its deadline.
    #[error("Ledger store operation timed out: {0}")]
    Timeout(&'static str),

    /// A stored document could not be mapped back to an entry.
    #[error("Corrupt ledger document: {0}")]
    Corrupt(String),
}
