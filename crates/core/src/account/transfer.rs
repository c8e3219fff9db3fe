//! Transfer validation, lock ordering, and balance planning.

use rust_decimal::Decimal;
use tallyflow_shared::types::fits_money_scale;

use super::AccountId;
use super::error::TransferError;

/// A transfer request that passed pre-storage validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    from: AccountId,
    to: AccountId,
    amount: Decimal,
}

impl TransferRequest {
    /// Validates the request without touching storage.
    ///
    /// Rejects non-positive amounts, amounts finer than the stored scale,
    /// and transfers from an account to itself.
    pub fn new(from: AccountId, to: AccountId, amount: Decimal) -> Result<Self, TransferError> {
        if amount <= Decimal::ZERO {
            return Err(TransferError::NonPositiveAmount(amount));
        }
        if !fits_money_scale(amount) {
            return Err(TransferError::ExcessScale(amount));
        }
        if from == to {
            return Err(TransferError::SameAccount(from));
        }
        Ok(Self { from, to, amount })
    }

    /// Debited account.
    #[must_use]
    pub const fn from(&self) -> AccountId {
        self.from
    }

    /// Credited account.
    #[must_use]
    pub const fn to(&self) -> AccountId {
        self.to
    }

    /// Amount moved.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.amount
    }

    /// Order in which the two rows must be locked.
    #[must_use]
    pub fn lock_order(&self) -> [AccountId; 2] {
        lock_order(self.from, self.to)
    }
}

/// Returns both account ids in ascending order.
///
/// Every transfer locks rows in this order, so two opposite-direction
/// transfers over the same pair queue on the same first lock instead of
/// each holding one row and waiting on the other.
#[must_use]
pub fn lock_order(a: AccountId, b: AccountId) -> [AccountId; 2] {
    if a <= b { [a, b] } else { [b, a] }
}

/// New balances for both sides of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPlan {
    /// Debited account.
    pub from: AccountId,
    /// Credited account.
    pub to: AccountId,
    /// Source balance after the debit.
    pub from_balance: Decimal,
    /// Destination balance after the credit.
    pub to_balance: Decimal,
}

/// Computes post-transfer balances from balances read under lock.
pub fn plan_transfer(
    request: &TransferRequest,
    from_balance: Decimal,
    to_balance: Decimal,
) -> Result<TransferPlan, TransferError> {
    if from_balance < request.amount {
        return Err(TransferError::InsufficientFunds {
            account_id: request.from,
            available: from_balance,
            requested: request.amount,
        });
    }

    let new_from = from_balance
        .checked_sub(request.amount)
        .ok_or(TransferError::BalanceOverflow(request.from))?;
    let new_to = to_balance
        .checked_add(request.amount)
        .ok_or(TransferError::BalanceOverflow(request.to))?;

    Ok(TransferPlan {
        from: request.from,
        to: request.to,
        from_balance: new_from,
        to_balance: new_to,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(0))]
    #[case(dec!(-1))]
    #[case(dec!(-0.0001))]
    fn test_rejects_non_positive_amount(#[case] amount: Decimal) {
        assert_eq!(
            TransferRequest::new(1, 2, amount),
            Err(TransferError::NonPositiveAmount(amount))
        );
    }

    #[test]
    fn test_rejects_same_account() {
        assert_eq!(
            TransferRequest::new(5, 5, dec!(10)),
            Err(TransferError::SameAccount(5))
        );
    }

    #[test]
    fn test_rejects_excess_scale() {
        assert_eq!(
            TransferRequest::new(1, 2, dec!(0.00001)),
            Err(TransferError::ExcessScale(dec!(0.00001)))
        );
    }

    #[rstest]
    #[case(1, 2, [1, 2])]
    #[case(2, 1, [1, 2])]
    #[case(100, 7, [7, 100])]
    fn test_lock_order_is_ascending(
        #[case] from: AccountId,
        #[case] to: AccountId,
        #[case] expected: [AccountId; 2],
    ) {
        let request = TransferRequest::new(from, to, dec!(1)).unwrap();
        assert_eq!(request.lock_order(), expected);
    }

    #[test]
    fn test_transfer_fifty_of_hundred() {
        let request = TransferRequest::new(1, 2, dec!(50.00)).unwrap();
        let plan = plan_transfer(&request, dec!(100.00), dec!(0.00)).unwrap();
        assert_eq!(plan.from_balance, dec!(50.00));
        assert_eq!(plan.to_balance, dec!(50.00));
    }

    #[test]
    fn test_transfer_exceeding_balance_is_rejected() {
        let request = TransferRequest::new(1, 2, dec!(150.00)).unwrap();
        let err = plan_transfer(&request, dec!(100.00), dec!(0.00)).unwrap_err();
        assert_eq!(
            err,
            TransferError::InsufficientFunds {
                account_id: 1,
                available: dec!(100.00),
                requested: dec!(150.00),
            }
        );
    }

    #[test]
    fn test_transfer_of_entire_balance() {
        let request = TransferRequest::new(2, 1, dec!(100.00)).unwrap();
        let plan = plan_transfer(&request, dec!(100.00), dec!(3.50)).unwrap();
        assert_eq!(plan.from_balance, Decimal::ZERO);
        assert_eq!(plan.to_balance, dec!(103.50));
        assert_eq!((plan.from, plan.to), (2, 1));
    }

    #[test]
    fn test_credit_overflow_is_rejected() {
        let request = TransferRequest::new(1, 2, dec!(1)).unwrap();
        assert_eq!(
            plan_transfer(&request, dec!(1), Decimal::MAX),
            Err(TransferError::BalanceOverflow(2))
        );
    }
}
