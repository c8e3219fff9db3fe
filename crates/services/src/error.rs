//! Service layer error type.

use thiserror::Error;

use tallyflow_core::account::{AccountValidationError, TransferError};
use tallyflow_core::consumer::InvalidTransition;
use tallyflow_core::transaction::{EventDecodeError, TransactionValidationError};
use tallyflow_db::{AccountError, TransactionError};
use tallyflow_docstore::LedgerStoreError;
use tallyflow_messaging::BrokerError;
use tallyflow_shared::AppError;

/// Errors raised by services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Create-transaction request rejected.
    #[error(transparent)]
    InvalidTransaction(#[from] TransactionValidationError),

    /// Create-account request rejected.
    #[error(transparent)]
    InvalidAccount(#[from] AccountValidationError),

    /// Any other malformed input (ids, dates, limits).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Requested record does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Account storage or transfer rule failure.
    #[error(transparent)]
    Account(#[from] AccountError),

    /// Transaction storage failure.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Broker failure, including publish timeouts.
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    /// Ledger store failure.
    #[error(transparent)]
    LedgerStore(#[from] LedgerStoreError),

    /// A delivered payload could not be decoded.
    #[error(transparent)]
    Decode(#[from] EventDecodeError),

    /// An event could not be serialized.
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    /// Consumer lifecycle violated.
    #[error(transparent)]
    Lifecycle(#[from] InvalidTransition),

    /// A background task panicked or was aborted.
    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<TransferError> for ServiceError {
    fn from(err: TransferError) -> Self {
        Self::Account(AccountError::Transfer(err))
    }
}

fn transfer_to_app(err: &TransferError) -> AppError {
    let message = err.to_string();
    match err.http_status_code() {
        404 => AppError::NotFound(message),
        422 => AppError::BusinessRule(message),
        _ => AppError::Validation(message),
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidTransaction(e) => Self::Validation(e.to_string()),
            ServiceError::InvalidAccount(e) => Self::Validation(e.to_string()),
            ServiceError::InvalidInput(msg) => Self::Validation(msg),
            ServiceError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            ServiceError::Account(AccountError::Transfer(e)) => transfer_to_app(&e),
            ServiceError::Account(AccountError::Database(e)) => Self::Database(e.to_string()),
            ServiceError::Transaction(e) => Self::Database(e.to_string()),
            ServiceError::Broker(e) => Self::ExternalService(e.to_string()),
            ServiceError::LedgerStore(e) => Self::ExternalService(e.to_string()),
            e @ (ServiceError::Decode(_)
            | ServiceError::Encode(_)
            | ServiceError::Lifecycle(_)
            | ServiceError::Task(_)) => Self::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use sea_orm::DbErr;

    #[rstest]
    #[case(ServiceError::InvalidInput("bad date".into()), 400)]
    #[case(ServiceError::InvalidTransaction(TransactionValidationError::SameAccount), 400)]
    #[case(ServiceError::NotFound("Transaction 9".into()), 404)]
    #[case(TransferError::SameAccount(1).into(), 400)]
    #[case(TransferError::AccountNotFound(3).into(), 404)]
    #[case(
        TransferError::InsufficientFunds { account_id: 1, available: dec!(5), requested: dec!(9) }.into(),
        422
    )]
    #[case(ServiceError::Account(AccountError::Database(DbErr::Custom("down".into()))), 500)]
    #[case(ServiceError::Broker(BrokerError::Timeout("produce")), 500)]
    #[case(ServiceError::LedgerStore(LedgerStoreError::Query("x".into())), 500)]
    fn test_maps_to_status(#[case] err: ServiceError, #[case] status: u16) {
        assert_eq!(AppError::from(err).status_code(), status);
    }

    #[test]
    fn test_storage_failures_hide_root_cause() {
        let err = ServiceError::Account(AccountError::Database(DbErr::Custom(
            "password authentication failed".into(),
        )));
        let app = AppError::from(err);
        assert_eq!(app.public_message(), "An internal error occurred");
    }
}
