//! Append-only ledger entries materialized from transaction events.

pub mod entry;

pub use entry::{EntryType, LedgerEntry};
