//! Transaction validation and event decoding errors.

use thiserror::Error;

/// Errors raised while validating a create-transaction request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionValidationError {
    /// Field-level shape violations reported by the validator derive.
    #[error("Invalid request: {0}")]
    InvalidShape(String),

    /// Amount must be strictly positive.
    #[error("Amount must be positive")]
    NonPositiveAmount,

    /// Amount carries more decimal places than the column stores.
    #[error("Amount must have at most 4 decimal places")]
    ExcessScale,

    /// Source and destination accounts are identical.
    #[error("Source and destination accounts must differ")]
    SameAccount,

    /// Transaction type is not one of the known tags.
    #[error("Unknown transaction type: {0}")]
    UnknownType(String),

    /// Currency code is not supported.
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),
}

/// Errors raised while decoding a broker payload into a transaction event.
#[derive(Debug, Error)]
pub enum EventDecodeError {
    /// Payload is not valid JSON or does not match the event shape.
    #[error("Malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Event carries a zero or negative amount.
    #[error("Event {0} has a non-positive amount")]
    NonPositiveAmount(String),

    /// Event names no account to post against.
    #[error("Event {0} has no account to post against")]
    MissingAccount(String),
}
