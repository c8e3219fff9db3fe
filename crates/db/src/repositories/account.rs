//! Account repository: account creation, point reads, and locked transfers.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbErr, EntityTrait, QueryFilter, QuerySelect, Set, TransactionTrait, sea_query::Expr,
};
use tracing::{instrument, warn};

use tallyflow_core::account::{
    AccountId, NewAccount, TransferError, TransferRequest, plan_transfer,
};

use crate::entities::accounts;

/// Error types for account operations.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// Transfer rejected by validation or business rules.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Balances after a committed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Debited account.
    pub from_account_id: AccountId,
    /// Credited account.
    pub to_account_id: AccountId,
    /// Amount moved.
    pub amount: Decimal,
    /// Source balance after the transfer.
    pub from_balance: Decimal,
    /// Destination balance after the transfer.
    pub to_balance: Decimal,
}

/// Account repository.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: Arc<DatabaseConnection>,
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Inserts a validated account.
    pub async fn create_account(
        &self,
        account: &NewAccount,
    ) -> Result<accounts::Model, AccountError> {
        let now = Utc::now().into();
        let model = accounts::ActiveModel {
            owner: Set(account.owner.clone()),
            balance: Set(account.initial_balance),
            currency: Set(account.currency.code().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        Ok(model.insert(self.db.as_ref()).await?)
    }

    /// Point read; `Ok(None)` when the row does not exist.
    pub async fn find_by_id(&self, id: AccountId) -> Result<Option<accounts::Model>, AccountError> {
        Ok(accounts::Entity::find_by_id(id).one(self.db.as_ref()).await?)
    }

    /// Moves `amount` between two accounts atomically.
    ///
    /// Both rows are locked `FOR UPDATE` in ascending id order. Every failure
    /// after `BEGIN` is followed by an explicit rollback, so callers never
    /// observe a half-applied transfer.
    #[instrument(skip(self), fields(from = request.from(), to = request.to(), amount = %request.amount()))]
    pub async fn transfer_balance(
        &self,
        request: &TransferRequest,
    ) -> Result<TransferOutcome, AccountError> {
        let txn = self.db.begin().await?;

        match apply_transfer(&txn, request).await {
            Ok(outcome) => {
                txn.commit().await?;
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(error = %rollback_err, "Rollback after failed transfer also failed");
                }
                Err(err)
            }
        }
    }
}

/// Locks, re-reads, plans, and writes both rows inside `txn`.
async fn apply_transfer(
    txn: &DatabaseTransaction,
    request: &TransferRequest,
) -> Result<TransferOutcome, AccountError> {
    let [first_id, second_id] = request.lock_order();
    let first = lock_account(txn, first_id).await?;
    let second = lock_account(txn, second_id).await?;

    let (from, to) = if first.id == request.from() {
        (first, second)
    } else {
        (second, first)
    };

    if from.currency != to.currency {
        return Err(TransferError::CurrencyMismatch {
            from: from.id,
            from_currency: from.currency,
            to: to.id,
            to_currency: to.currency,
        }
        .into());
    }

    let plan = plan_transfer(request, from.balance, to.balance)?;

    write_balance(txn, plan.from, plan.from_balance).await?;
    write_balance(txn, plan.to, plan.to_balance).await?;

    Ok(TransferOutcome {
        from_account_id: plan.from,
        to_account_id: plan.to,
        amount: request.amount(),
        from_balance: plan.from_balance,
        to_balance: plan.to_balance,
    })
}

async fn lock_account(
    txn: &DatabaseTransaction,
    id: AccountId,
) -> Result<accounts::Model, AccountError> {
    accounts::Entity::find_by_id(id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| TransferError::AccountNotFound(id).into())
}

async fn write_balance<C: ConnectionTrait>(
    conn: &C,
    id: AccountId,
    balance: Decimal,
) -> Result<(), DbErr> {
    let result = accounts::Entity::update_many()
        .col_expr(accounts::Column::Balance, Expr::value(balance))
        .filter(accounts::Column::Id.eq(id))
        .exec(conn)
        .await?;

    if result.rows_affected == 1 {
        Ok(())
    } else {
        Err(DbErr::RecordNotUpdated)
    }
}
