//! Services for Tallyflow.
//!
//! - [`supervisor`]: retrying connects and health checks
//! - [`transactions`]: persist-then-publish producer
//! - [`consumer`]: ledger materialization worker
//! - [`ledger`]: ledger read side
//! - [`outbox`]: republishing of unconfirmed events
//! - [`accounts`]: account creation and locked transfers

pub mod accounts;
pub mod consumer;
pub mod error;
pub mod ledger;
pub mod outbox;
pub mod supervisor;
pub mod transactions;

pub use accounts::AccountService;
pub use consumer::{ConsumerHandle, ConsumerSettings, ConsumerStats, LedgerConsumer};
pub use error::ServiceError;
pub use ledger::LedgerQuery;
pub use outbox::{OutboxSweeper, SweepReport};
pub use supervisor::{
    ComponentHealth, HealthReport, SupervisorError, check_component, connect_with_retry,
};
pub use transactions::TransactionService;
