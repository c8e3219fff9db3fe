//! Repository layer for database operations.

pub mod account;
pub mod transaction;

pub use account::{AccountError, AccountRepository, TransferOutcome};
pub use transaction::{TransactionError, TransactionRepository};
