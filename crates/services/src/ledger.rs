//! Read side of the ledger.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::instrument;

use tallyflow_core::ledger::LedgerEntry;
use tallyflow_docstore::LedgerStore;

use crate::error::ServiceError;

/// Filters ledger entries by account or by day.
#[derive(Clone)]
pub struct LedgerQuery {
    store: Arc<dyn LedgerStore>,
}

impl LedgerQuery {
    /// Creates the query service.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Entries posted on `account_id`, oldest first.
    #[instrument(skip(self))]
    pub async fn by_account(&self, account_id: &str) -> Result<Vec<LedgerEntry>, ServiceError> {
        let account_id = account_id.trim();
        if account_id.is_empty() {
            return Err(ServiceError::InvalidInput(
                "account id is required".to_string(),
            ));
        }
        Ok(self.store.list_by_account(account_id).await?)
    }

    /// Entries created on the given UTC day (`YYYY-MM-DD`), or all when absent.
    #[instrument(skip(self))]
    pub async fn by_date(&self, date: Option<&str>) -> Result<Vec<LedgerEntry>, ServiceError> {
        let day = date
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(parse_day)
            .transpose()?;
        Ok(self.store.list(day).await?)
    }
}

/// Parses a `YYYY-MM-DD` day.
pub fn parse_day(raw: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ServiceError::InvalidInput(format!("date must be YYYY-MM-DD, got {raw:?}")))
}
