//! Transaction producer: persist, then publish.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use tallyflow_core::transaction::{CreateTransactionRequest, TransactionEvent};
use tallyflow_db::TransactionRepository;
use tallyflow_messaging::{BrokerError, ProducerConnection};
use tallyflow_shared::types::ListLimit;

use crate::error::ServiceError;

/// Creates transactions and publishes their events.
#[derive(Clone)]
pub struct TransactionService {
    repo: TransactionRepository,
    producer: Arc<dyn ProducerConnection>,
    publish_timeout: Duration,
}

impl TransactionService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        repo: TransactionRepository,
        producer: Arc<dyn ProducerConnection>,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            producer,
            publish_timeout,
        }
    }

    pub(crate) const fn repository(&self) -> &TransactionRepository {
        &self.repo
    }

    /// Validates, persists a `pending` row, and publishes its event.
    ///
    /// A publish failure leaves the row in place with `published_at` unset
    /// and is returned to the caller; the outbox sweep republishes it later.
    #[instrument(skip(self, request), fields(transaction_type = %request.transaction_type))]
    pub async fn create(
        &self,
        request: CreateTransactionRequest,
    ) -> Result<TransactionEvent, ServiceError> {
        let input = request.into_new_transaction()?;
        let row = self.repo.create(&input).await?;
        let event = row.to_event()?;
        info!(
            id = event.id,
            transaction_id = %event.transaction_id,
            "Transaction persisted"
        );

        if let Err(e) = self.publish(&event).await {
            error!(
                id = event.id,
                transaction_id = %event.transaction_id,
                error = %e,
                "Publish failed, row left for outbox sweep"
            );
            return Err(e);
        }
        self.confirm_published(event.id).await;
        Ok(event)
    }

    /// Publishes `event` under the publish deadline.
    pub async fn publish(&self, event: &TransactionEvent) -> Result<String, ServiceError> {
        let payload = event.to_payload()?;
        let key = event.transaction_id.to_string();

        let record_id = tokio::time::timeout(self.publish_timeout, self.producer.produce(&key, &payload))
            .await
            .map_err(|_| BrokerError::Timeout("produce"))??;

        info!(
            transaction_id = %event.transaction_id,
            record_id = %record_id,
            "Event published"
        );
        Ok(record_id)
    }

    /// Stamps `published_at`; a failure only means the sweep republishes later.
    pub(crate) async fn confirm_published(&self, id: i64) {
        match self.repo.mark_published(id, Utc::now()).await {
            Ok(true) => {}
            Ok(false) => info!(id, "Row already marked published"),
            Err(e) => warn!(id, error = %e, "Failed to stamp published_at"),
        }
    }

    /// Point read by row id.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<TransactionEvent, ServiceError> {
        let row = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Transaction {id}")))?;
        Ok(row.to_event()?)
    }

    /// Most recent transactions, newest first.
    #[instrument(skip(self))]
    pub async fn list(&self, limit: ListLimit) -> Result<Vec<TransactionEvent>, ServiceError> {
        let rows = self.repo.list_recent(limit.get()).await?;
        rows.iter()
            .map(|row| row.to_event().map_err(ServiceError::from))
            .collect()
    }
}
