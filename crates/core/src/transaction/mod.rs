//! Transaction requests, lifecycle status, and the broker event payload.

pub mod error;
pub mod event;
pub mod request;
pub mod types;

pub use error::{EventDecodeError, TransactionValidationError};
pub use event::TransactionEvent;
pub use request::{CreateTransactionRequest, NewTransaction};
pub use types::{TransactionStatus, TransactionType};
