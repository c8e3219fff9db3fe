//! Account creation, lookup, and direct transfers.

use rust_decimal::Decimal;
use tracing::{info, instrument};

use tallyflow_core::account::{AccountId, NewAccount, TransferRequest};
use tallyflow_db::entities::accounts;
use tallyflow_db::{AccountRepository, TransferOutcome};
use tallyflow_shared::types::Currency;

use crate::error::ServiceError;

/// Account service over the relational store.
#[derive(Debug, Clone)]
pub struct AccountService {
    repo: AccountRepository,
}

impl AccountService {
    /// Creates the service.
    #[must_use]
    pub const fn new(repo: AccountRepository) -> Self {
        Self { repo }
    }

    /// Opens an account; `currency` defaults to USD.
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        owner: &str,
        currency: Option<&str>,
        initial_balance: Decimal,
    ) -> Result<accounts::Model, ServiceError> {
        let currency = match currency {
            None => Currency::default(),
            Some(code) => code
                .parse::<Currency>()
                .map_err(|_| ServiceError::InvalidInput(format!("Unknown currency: {code}")))?,
        };
        let account = NewAccount::new(owner, currency, initial_balance)?;
        let created = self.repo.create_account(&account).await?;
        info!(account_id = created.id, "Account created");
        Ok(created)
    }

    /// Point read.
    #[instrument(skip(self))]
    pub async fn get(&self, id: AccountId) -> Result<accounts::Model, ServiceError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Account {id}")))
    }

    /// Moves `amount` from one account to another atomically.
    #[instrument(skip(self))]
    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<TransferOutcome, ServiceError> {
        let request = TransferRequest::new(from, to, amount)?;
        let outcome = self.repo.transfer_balance(&request).await?;
        info!(from, to, amount = %amount, "Transfer committed");
        Ok(outcome)
    }
}
