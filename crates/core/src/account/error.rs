//! Account and transfer error types.

use rust_decimal::Decimal;
use thiserror::Error;

use super::AccountId;

/// Errors raised while validating or planning a balance transfer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    // ========== Validation Errors ==========
    /// Transfer amount must be strictly positive.
    #[error("Transfer amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    /// Amount carries more decimal places than balances store.
    #[error("Transfer amount {0} has more than 4 decimal places")]
    ExcessScale(Decimal),

    /// Source and destination are the same account.
    #[error("Cannot transfer from account {0} to itself")]
    SameAccount(AccountId),

    // ========== State Errors ==========
    /// Account row does not exist.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Source balance is lower than the requested amount.
    #[error("Insufficient funds in account {account_id}: available {available}, requested {requested}")]
    InsufficientFunds {
        /// The debited account.
        account_id: AccountId,
        /// Balance read under lock.
        available: Decimal,
        /// Requested transfer amount.
        requested: Decimal,
    },

    /// Crediting the destination would overflow the decimal range.
    #[error("Balance overflow on account {0}")]
    BalanceOverflow(AccountId),

    /// Accounts hold different currencies.
    #[error("Currency mismatch: account {from} holds {from_currency}, account {to} holds {to_currency}")]
    CurrencyMismatch {
        /// Source account.
        from: AccountId,
        /// Source currency code.
        from_currency: String,
        /// Destination account.
        to: AccountId,
        /// Destination currency code.
        to_currency: String,
    },
}

impl TransferError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NonPositiveAmount(_) | Self::ExcessScale(_) | Self::SameAccount(_) => {
                "VALIDATION_ERROR"
            }
            Self::AccountNotFound(_) => "NOT_FOUND",
            Self::InsufficientFunds { .. }
            | Self::BalanceOverflow(_)
            | Self::CurrencyMismatch { .. } => "BUSINESS_RULE_VIOLATION",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::NonPositiveAmount(_) | Self::ExcessScale(_) | Self::SameAccount(_) => 400,
            Self::AccountNotFound(_) => 404,
            Self::InsufficientFunds { .. }
            | Self::BalanceOverflow(_)
            | Self::CurrencyMismatch { .. } => 422,
        }
    }

    /// Returns true if the error was detected before touching storage.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::NonPositiveAmount(_) | Self::ExcessScale(_) | Self::SameAccount(_)
        )
    }
}

/// Errors raised while validating a new account.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountValidationError {
    /// Owner name is blank.
    #[error("Owner name is required")]
    EmptyOwner,

    /// Owner name is longer than the column allows.
    #[error("Owner name must be at most {max} characters")]
    OwnerTooLong {
        /// Maximum number of characters.
        max: usize,
    },

    /// Opening balance below zero.
    #[error("Initial balance cannot be negative, got {0}")]
    NegativeInitialBalance(Decimal),

    /// Opening balance carries more decimal places than balances store.
    #[error("Initial balance {0} has more than 4 decimal places")]
    ExcessScale(Decimal),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(TransferError::NonPositiveAmount(dec!(0)), 400, "VALIDATION_ERROR")]
    #[case(TransferError::SameAccount(1), 400, "VALIDATION_ERROR")]
    #[case(TransferError::AccountNotFound(7), 404, "NOT_FOUND")]
    #[case(
        TransferError::InsufficientFunds { account_id: 1, available: dec!(100), requested: dec!(150) },
        422,
        "BUSINESS_RULE_VIOLATION"
    )]
    fn test_transfer_error_mapping(
        #[case] err: TransferError,
        #[case] status: u16,
        #[case] code: &str,
    ) {
        assert_eq!(err.http_status_code(), status);
        assert_eq!(err.error_code(), code);
    }

    #[test]
    fn test_insufficient_funds_message() {
        let err = TransferError::InsufficientFunds {
            account_id: 1,
            available: dec!(100.00),
            requested: dec!(150.00),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds in account 1: available 100.00, requested 150.00"
        );
        assert!(!err.is_validation());
    }
}
