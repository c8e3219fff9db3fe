//! Core domain logic for Tallyflow.
//!
//! This crate contains pure domain logic with ZERO web, database or broker
//! dependencies. Storage and messaging crates build on the types here.
//!
//! # Modules
//!
//! - `account` - Balance transfer planning and account validation
//! - `transaction` - Transaction requests, status and the wire event
//! - `ledger` - Ledger entry derivation from transaction events
//! - `consumer` - Ledger consumer lifecycle and dead-letter policy
//! - `retry` - Bounded exponential backoff for connection attempts

pub mod account;
pub mod consumer;
pub mod ledger;
pub mod retry;
pub mod transaction;
