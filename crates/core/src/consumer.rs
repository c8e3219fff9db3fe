//! Ledger consumer lifecycle.
//!
//! The valid transitions are:
//! - Disconnected → Connecting (start)
//! - Connecting → Polling (group joined)
//! - Polling ↔ Processing (batch received / batch done)
//! - Connecting | Polling | Processing → ShuttingDown (cancelled or join failed)
//! - ShuttingDown → Closed (task joined)

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Consumer lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerState {
    /// Not connected to the broker.
    #[default]
    Disconnected,
    /// Joining the consumer group.
    Connecting,
    /// Waiting for records.
    Polling,
    /// Handling a batch.
    Processing,
    /// Cancellation observed, draining the in-flight record.
    ShuttingDown,
    /// Task finished.
    Closed,
}

impl ConsumerState {
    /// Returns the string representation of the state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Polling => "polling",
            Self::Processing => "processing",
            Self::ShuttingDown => "shutting_down",
            Self::Closed => "closed",
        }
    }

    /// Returns true if moving to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Disconnected, Self::Connecting)
                | (Self::Connecting, Self::Polling)
                | (Self::Polling, Self::Processing)
                | (Self::Processing, Self::Polling)
                | (
                    Self::Connecting | Self::Polling | Self::Processing,
                    Self::ShuttingDown
                )
                | (Self::ShuttingDown, Self::Closed)
        )
    }

    /// Validates and performs a transition.
    pub fn transition(self, next: Self) -> Result<Self, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition { from: self, to: next })
        }
    }

    /// Returns true once the task has exited.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid consumer transition from {from} to {to}")]
pub struct InvalidTransition {
    /// Current state.
    pub from: ConsumerState,
    /// Requested state.
    pub to: ConsumerState,
}

/// What to do with a record whose processing failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Leave it unacknowledged so the broker redelivers it.
    Redeliver,
    /// Copy it to the dead-letter stream and acknowledge it.
    DeadLetter,
}

/// Caps how many times one record is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadLetterPolicy {
    max_deliveries: u64,
}

impl DeadLetterPolicy {
    /// Creates a policy; a cap of zero is treated as one delivery.
    #[must_use]
    pub const fn new(max_deliveries: u64) -> Self {
        Self {
            max_deliveries: if max_deliveries == 0 { 1 } else { max_deliveries },
        }
    }

    /// Maximum deliveries before dead-lettering.
    #[must_use]
    pub const fn max_deliveries(&self) -> u64 {
        self.max_deliveries
    }

    /// Decides the fate of a record that failed on its `delivery_count`-th delivery.
    #[must_use]
    pub const fn on_failure(&self, delivery_count: u64) -> FailureAction {
        if delivery_count >= self.max_deliveries {
            FailureAction::DeadLetter
        } else {
            FailureAction::Redeliver
        }
    }
}

impl Default for DeadLetterPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}
