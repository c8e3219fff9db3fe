//! Transaction repository for the producer and the outbox sweep.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, sea_query::Expr,
};
use uuid::Uuid;

use tallyflow_core::transaction::{
    NewTransaction, TransactionEvent, TransactionStatus, TransactionType,
};
use tallyflow_shared::types::{Currency, TransactionId};

use crate::entities::transactions;

/// Error types for transaction operations.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// A stored row holds a value the domain does not recognize.
    #[error("Transaction {id} has invalid {field}: {value}")]
    CorruptRow {
        /// Row id.
        id: i64,
        /// Column name.
        field: &'static str,
        /// Offending value.
        value: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl transactions::Model {
    /// Builds the broker event for this row.
    pub fn to_event(&self) -> Result<TransactionEvent, TransactionError> {
        let corrupt = |field: &'static str, value: &str| TransactionError::CorruptRow {
            id: self.id,
            field,
            value: value.to_string(),
        };

        let currency = self
            .currency
            .parse::<Currency>()
            .map_err(|_| corrupt("currency", &self.currency))?;
        let transaction_type = TransactionType::parse(&self.transaction_type)
            .ok_or_else(|| corrupt("transaction_type", &self.transaction_type))?;
        let status =
            TransactionStatus::parse(&self.status).ok_or_else(|| corrupt("status", &self.status))?;

        Ok(TransactionEvent {
            id: self.id,
            transaction_id: TransactionId::from_uuid(self.transaction_id),
            amount: self.amount,
            currency,
            description: self.description.clone(),
            source_account: self.source_account.clone(),
            destination_account: self.destination_account.clone(),
            transaction_type,
            status,
            created_at: self.created_at.with_timezone(&Utc),
            updated_at: self.updated_at.with_timezone(&Utc),
        })
    }
}

/// Transaction repository.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    db: Arc<DatabaseConnection>,
}

impl TransactionRepository {
    /// Creates a new transaction repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Persists a new `pending` row with a fresh transaction id.
    pub async fn create(
        &self,
        input: &NewTransaction,
    ) -> Result<transactions::Model, TransactionError> {
        let now = Utc::now().into();
        let model = transactions::ActiveModel {
            transaction_id: Set(Uuid::now_v7()),
            amount: Set(input.amount),
            currency: Set(input.currency.code().to_string()),
            description: Set(input.description.clone()),
            source_account: Set(input.source_account.clone()),
            destination_account: Set(input.destination_account.clone()),
            transaction_type: Set(input.transaction_type.as_str().to_string()),
            status: Set(TransactionStatus::Pending.as_str().to_string()),
            published_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        Ok(model.insert(self.db.as_ref()).await?)
    }

    /// Point read by row id.
    pub async fn find_by_id(
        &self,
        id: i64,
    ) -> Result<Option<transactions::Model>, TransactionError> {
        Ok(transactions::Entity::find_by_id(id).one(self.db.as_ref()).await?)
    }

    /// Most recent rows, newest first.
    pub async fn list_recent(
        &self,
        limit: u64,
    ) -> Result<Vec<transactions::Model>, TransactionError> {
        Ok(transactions::Entity::find()
            .order_by_desc(transactions::Column::CreatedAt)
            .order_by_desc(transactions::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await?)
    }

    /// Stamps `published_at` once the broker confirmed the event.
    ///
    /// Returns false if the row was already stamped by a concurrent sweep.
    pub async fn mark_published(
        &self,
        id: i64,
        at: DateTime<Utc>,
    ) -> Result<bool, TransactionError> {
        let result = transactions::Entity::update_many()
            .col_expr(
                transactions::Column::PublishedAt,
                Expr::value(Some(at.fixed_offset())),
            )
            .filter(transactions::Column::Id.eq(id))
            .filter(transactions::Column::PublishedAt.is_null())
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Marks a row that can never produce an event as `failed`.
    ///
    /// Only unpublished rows are touched. Returns false if nothing changed.
    pub async fn mark_failed(&self, id: i64) -> Result<bool, TransactionError> {
        let result = transactions::Entity::update_many()
            .col_expr(
                transactions::Column::Status,
                Expr::value(TransactionStatus::Failed.as_str()),
            )
            .filter(transactions::Column::Id.eq(id))
            .filter(transactions::Column::PublishedAt.is_null())
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Unpublished `pending` rows created before `older_than`, oldest first.
    pub async fn list_unpublished(
        &self,
        older_than: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<transactions::Model>, TransactionError> {
        Ok(transactions::Entity::find()
            .filter(transactions::Column::PublishedAt.is_null())
            .filter(transactions::Column::Status.eq(TransactionStatus::Pending.as_str()))
            .filter(transactions::Column::CreatedAt.lt(older_than.fixed_offset()))
            .order_by_asc(transactions::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use crate::repositories::test_support::transaction_log;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn row(id: i64) -> transactions::Model {
        let now = Utc::now().into();
        transactions::Model {
            id,
            transaction_id: Uuid::now_v7(),
            amount: dec!(25.00),
            currency: "USD".to_string(),
            description: "Lunch".to_string(),
            source_account: "A".to_string(),
            destination_account: "B".to_string(),
            transaction_type: "transfer".to_string(),
            status: "pending".to_string(),
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_returns_pending_row() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[row(1)]])
                .into_connection(),
        );
        let repo = TransactionRepository::new(db);

        let input = NewTransaction {
            amount: dec!(25.00),
            currency: Currency::Usd,
            description: "Lunch".to_string(),
            source_account: "A".to_string(),
            destination_account: "B".to_string(),
            transaction_type: TransactionType::Transfer,
        };
        let created = repo.create(&input).await.unwrap();

        assert_eq!(created.status, "pending");
        assert!(created.published_at.is_none());
    }

    #[tokio::test]
    async fn test_find_by_id_missing_is_none() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<transactions::Model>::new()])
                .into_connection(),
        );
        let repo = TransactionRepository::new(db);

        assert!(repo.find_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_recent_orders_newest_first() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[row(2), row(1)]])
                .into_connection(),
        );
        let repo = TransactionRepository::new(db.clone());

        let rows = repo.list_recent(100).await.unwrap();
        assert_eq!(rows.len(), 2);

        drop(repo);
        let log = transaction_log(db);
        assert!(log.contains("ORDER BY"));
        assert!(log.contains("DESC"));
    }

    #[tokio::test]
    async fn test_mark_published_reports_noop() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 0,
                    },
                ])
                .into_connection(),
        );
        let repo = TransactionRepository::new(db);

        assert!(repo.mark_published(1, Utc::now()).await.unwrap());
        assert!(!repo.mark_published(1, Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_unpublished_only_scans_pending_rows() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[row(1)]])
                .into_connection(),
        );
        let repo = TransactionRepository::new(db.clone());

        let rows = repo.list_unpublished(Utc::now(), 10).await.unwrap();
        assert_eq!(rows.len(), 1);

        drop(repo);
        let log = transaction_log(db);
        assert!(log.contains("IS NULL"));
        assert!(log.contains("\"pending\""));
    }

    #[tokio::test]
    async fn test_mark_failed_sets_status() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );
        let repo = TransactionRepository::new(db.clone());

        assert!(repo.mark_failed(3).await.unwrap());

        drop(repo);
        let log = transaction_log(db);
        assert!(log.contains(" SET "));
        assert!(log.contains("\"failed\""));
    }

    #[test]
    fn test_to_event_maps_columns() {
        let model = row(5);
        let event = model.to_event().unwrap();

        assert_eq!(event.id, 5);
        assert_eq!(event.transaction_id.into_inner(), model.transaction_id);
        assert_eq!(event.transaction_type, TransactionType::Transfer);
        assert_eq!(event.status, TransactionStatus::Pending);
        assert_eq!(event.currency, Currency::Usd);
    }

    #[test]
    fn test_to_event_rejects_unknown_type() {
        let mut model = row(5);
        model.transaction_type = "refund".to_string();

        assert!(matches!(
            model.to_event(),
            Err(TransactionError::CorruptRow {
                field: "transaction_type",
                ..
            })
        ));
    }
}
