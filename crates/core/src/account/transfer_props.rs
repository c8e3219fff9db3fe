//! Property-based tests for transfer planning.
//!
//! - Balance conservation: from + to is unchanged by a successful plan
//! - Non-negativity: no plan leaves a negative balance
//! - Lock ordering: both directions lock the same first row

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::error::TransferError;
use super::transfer::{TransferRequest, lock_order, plan_transfer};

/// Strategy to generate non-negative balances (0.0000 to 1,000,000.0000).
fn balance() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000_000i64).prop_map(|units| Decimal::new(units, 4))
}

/// Strategy to generate positive amounts (0.01 to 10,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate two distinct account ids.
fn account_pair() -> impl Strategy<Value = (i64, i64)> {
    (1i64..10_000i64, 1i64..10_000i64).prop_filter("distinct accounts", |(a, b)| a != b)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_successful_plan_conserves_sum(
        (from, to) in account_pair(),
        from_balance in balance(),
        to_balance in balance(),
        amount in positive_amount(),
    ) {
        let request = TransferRequest::new(from, to, amount).unwrap();
        if let Ok(plan) = plan_transfer(&request, from_balance, to_balance) {
            prop_assert_eq!(plan.from_balance + plan.to_balance, from_balance + to_balance);
        }
    }

    #[test]
    fn prop_plan_never_goes_negative(
        (from, to) in account_pair(),
        from_balance in balance(),
        to_balance in balance(),
        amount in positive_amount(),
    ) {
        let request = TransferRequest::new(from, to, amount).unwrap();
        match plan_transfer(&request, from_balance, to_balance) {
            Ok(plan) => {
                prop_assert!(plan.from_balance >= Decimal::ZERO);
                prop_assert!(plan.to_balance >= Decimal::ZERO);
            }
            Err(TransferError::InsufficientFunds { available, requested, .. }) => {
                prop_assert!(available < requested);
            }
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }

    #[test]
    fn prop_sequential_transfers_conserve_total(
        start_a in balance(),
        start_b in balance(),
        moves in prop::collection::vec((any::<bool>(), positive_amount()), 1..20),
    ) {
        let (mut a, mut b) = (start_a, start_b);
        for (a_to_b, amount) in moves {
            let (from, to) = if a_to_b { (1, 2) } else { (2, 1) };
            let request = TransferRequest::new(from, to, amount).unwrap();
            let (from_balance, to_balance) = if a_to_b { (a, b) } else { (b, a) };
            if let Ok(plan) = plan_transfer(&request, from_balance, to_balance) {
                if a_to_b {
                    (a, b) = (plan.from_balance, plan.to_balance);
                } else {
                    (b, a) = (plan.from_balance, plan.to_balance);
                }
            }
            prop_assert!(a >= Decimal::ZERO && b >= Decimal::ZERO);
        }
        prop_assert_eq!(a + b, start_a + start_b);
    }

    #[test]
    fn prop_lock_order_ignores_direction((a, b) in account_pair()) {
        let forward = lock_order(a, b);
        prop_assert_eq!(forward, lock_order(b, a));
        prop_assert!(forward[0] < forward[1]);
    }
}
