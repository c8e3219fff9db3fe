//! Account balances and direct transfers.
//!
//! Transfers are planned here and applied by the storage layer inside a
//! single locked transaction:
//! - validation happens before any storage access
//! - both rows are locked in ascending id order
//! - the plan is computed from balances read under lock

pub mod error;
pub mod transfer;

#[cfg(test)]
mod transfer_props;

use rust_decimal::Decimal;
use tallyflow_shared::types::{Currency, fits_money_scale};

pub use error::{AccountValidationError, TransferError};
pub use transfer::{TransferPlan, TransferRequest, lock_order, plan_transfer};

/// Relational account identifier (`BIGSERIAL`).
pub type AccountId = i64;

/// Maximum owner name length, matching the column definition.
pub const MAX_OWNER_LEN: usize = 255;

/// A validated account ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    /// Owner display name, trimmed.
    pub owner: String,
    /// Account currency.
    pub currency: Currency,
    /// Opening balance.
    pub initial_balance: Decimal,
}

impl NewAccount {
    /// Validates the inputs for account creation.
    pub fn new(
        owner: &str,
        currency: Currency,
        initial_balance: Decimal,
    ) -> Result<Self, AccountValidationError> {
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(AccountValidationError::EmptyOwner);
        }
        if owner.chars().count() > MAX_OWNER_LEN {
            return Err(AccountValidationError::OwnerTooLong { max: MAX_OWNER_LEN });
        }
        if initial_balance.is_sign_negative() && !initial_balance.is_zero() {
            return Err(AccountValidationError::NegativeInitialBalance(initial_balance));
        }
        if !fits_money_scale(initial_balance) {
            return Err(AccountValidationError::ExcessScale(initial_balance));
        }

        Ok(Self {
            owner: owner.to_string(),
            currency,
            initial_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_account_trims_owner() {
        let account = NewAccount::new("  Alice ", Currency::Usd, dec!(100.00)).unwrap();
        assert_eq!(account.owner, "Alice");
        assert_eq!(account.initial_balance, dec!(100.00));
    }

    #[test]
    fn test_new_account_rejects_blank_owner() {
        assert_eq!(
            NewAccount::new("   ", Currency::Usd, dec!(0)),
            Err(AccountValidationError::EmptyOwner)
        );
    }

    #[test]
    fn test_new_account_rejects_negative_balance() {
        assert_eq!(
            NewAccount::new("Bob", Currency::Eur, dec!(-0.01)),
            Err(AccountValidationError::NegativeInitialBalance(dec!(-0.01)))
        );
    }

    #[test]
    fn test_new_account_allows_zero_balance() {
        assert!(NewAccount::new("Bob", Currency::Eur, dec!(0)).is_ok());
    }

    #[test]
    fn test_new_account_rejects_excess_scale() {
        assert!(matches!(
            NewAccount::new("Bob", Currency::Usd, dec!(1.00001)),
            Err(AccountValidationError::ExcessScale(_))
        ));
    }
}
