//! Broker error types.

use thiserror::Error;

/// Errors raised by broker adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// Could not establish or keep a connection.
    #[error("Broker connection error: {0}")]
    Connection(String),

    /// The broker rejected or failed a command.
    #[error("Broker command error: {0}")]
    Command(String),

    /// A command did not finish before its deadline.
    #[error("Broker command timed out: {0}")]
    Timeout(&'static str),

    /// The connection was closed by its owner.
    #[error("Broker connection is closed")]
    Closed,
}

impl From<redis::RedisError> for BrokerError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
            Self::Connection(err.to_string())
        } else {
            Self::Command(err.to_string())
        }
    }
}
