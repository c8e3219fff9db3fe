//! Ledger document store.
//!
//! Entries are append-only and keyed by the source transaction id, which is
//! unique in the store. MongoDB is the production backend;
//! [`memory::InMemoryLedgerStore`] backs tests.

pub mod error;
pub mod memory;
pub mod mongo;
pub mod store;

pub use error::LedgerStoreError;
pub use memory::InMemoryLedgerStore;
pub use mongo::MongoLedgerStore;
pub use store::{InsertOutcome, LedgerStore, day_bounds};
