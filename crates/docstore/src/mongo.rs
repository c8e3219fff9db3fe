//! MongoDB ledger store.
//!
//! Documents live in one collection with a unique index on
//! `transaction_id`. A duplicate-key error on insert means a concurrent or
//! earlier delivery already wrote the entry and is reported as
//! [`InsertOutcome::AlreadyPresent`].

use std::future::IntoFuture;
use std::time::Duration;

use async_trait::async_trait;
use bson::{Document, doc};
use chrono::{DateTime, NaiveDate, Utc};
use futures::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use tallyflow_core::ledger::{EntryType, LedgerEntry};
use tallyflow_shared::config::DocumentStoreConfig;
use tallyflow_shared::types::{Currency, LedgerEntryId, TransactionId};

use crate::error::LedgerStoreError;
use crate::store::{InsertOutcome, LedgerStore, day_bounds};

const DUPLICATE_KEY: i32 = 11000;

/// Stored shape of a ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerDocument {
    entry_id: String,
    account_id: String,
    amount: String,
    entry_type: EntryType,
    currency: Currency,
    counterparty: Option<String>,
    transaction_id: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
}

impl From<&LedgerEntry> for LedgerDocument {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            entry_id: entry.id.to_string(),
            account_id: entry.account_id.clone(),
            amount: entry.amount.to_string(),
            entry_type: entry.entry_type,
            currency: entry.currency,
            counterparty: entry.counterparty.clone(),
            transaction_id: entry.transaction_id.to_string(),
            created_at: entry.created_at,
        }
    }
}

impl TryFrom<LedgerDocument> for LedgerEntry {
    type Error = LedgerStoreError;

    fn try_from(doc: LedgerDocument) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, value: &str| {
            LedgerStoreError::Corrupt(format!("{field} = {value:?} in entry {}", doc.entry_id))
        };
        let id = doc
            .entry_id
            .parse::<Uuid>()
            .map_err(|_| corrupt("entry_id", &doc.entry_id))?;
        let transaction_id = doc
            .transaction_id
            .parse::<Uuid>()
            .map_err(|_| corrupt("transaction_id", &doc.transaction_id))?;
        let amount = doc
            .amount
            .parse::<Decimal>()
            .map_err(|_| corrupt("amount", &doc.amount))?;

        Ok(Self {
            id: LedgerEntryId::from_uuid(id),
            account_id: doc.account_id,
            amount,
            entry_type: doc.entry_type,
            currency: doc.currency,
            counterparty: doc.counterparty,
            transaction_id: TransactionId::from_uuid(transaction_id),
            created_at: doc.created_at,
        })
    }
}

fn map_error(err: &mongodb::error::Error) -> LedgerStoreError {
    match *err.kind {
        ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) => {
            LedgerStoreError::Connection(err.to_string())
        }
        _ => LedgerStoreError::Query(err.to_string()),
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write)) if write.code == DUPLICATE_KEY
    )
}

/// Runs a driver future under a deadline.
async fn bounded<T, F>(deadline: Duration, op: &'static str, fut: F) -> Result<T, LedgerStoreError>
where
    F: IntoFuture<Output = mongodb::error::Result<T>>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| LedgerStoreError::Timeout(op))?
        .map_err(|e| map_error(&e))
}

/// MongoDB-backed [`LedgerStore`].
#[derive(Debug, Clone)]
pub struct MongoLedgerStore {
    database: Database,
    collection: Collection<LedgerDocument>,
    deadline: Duration,
}

impl MongoLedgerStore {
    /// Connects, pings, and ensures the unique `transaction_id` index.
    pub async fn connect(config: &DocumentStoreConfig) -> Result<Self, LedgerStoreError> {
        let deadline = config.command_timeout();
        let client = bounded(deadline, "connect", Client::with_uri_str(&config.uri)).await?;
        let database = client.database(&config.database);
        let collection = database.collection::<LedgerDocument>(&config.collection);

        let store = Self {
            database,
            collection,
            deadline,
        };
        store.ping().await?;
        store.ensure_indexes().await?;

        info!(
            database = %config.database,
            collection = %config.collection,
            "Connected ledger store"
        );
        Ok(store)
    }

    async fn ensure_indexes(&self) -> Result<(), LedgerStoreError> {
        let unique_transaction = IndexModel::builder()
            .keys(doc! { "transaction_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let by_account = IndexModel::builder()
            .keys(doc! { "account_id": 1, "created_at": 1 })
            .build();

        bounded(
            self.deadline,
            "create_index",
            self.collection.create_index(unique_transaction),
        )
        .await?;
        bounded(
            self.deadline,
            "create_index",
            self.collection.create_index(by_account),
        )
        .await?;
        Ok(())
    }

    async fn find_all(&self, filter: Document) -> Result<Vec<LedgerEntry>, LedgerStoreError> {
        let cursor = bounded(
            self.deadline,
            "find",
            self.collection.find(filter).sort(doc! { "created_at": 1 }),
        )
        .await?;
        let documents: Vec<LedgerDocument> =
            bounded(self.deadline, "find", cursor.try_collect()).await?;

        documents.into_iter().map(LedgerEntry::try_from).collect()
    }
}

#[async_trait]
impl LedgerStore for MongoLedgerStore {
    async fn exists(&self, transaction_id: TransactionId) -> Result<bool, LedgerStoreError> {
        let found = bounded(
            self.deadline,
            "find_one",
            self.collection
                .find_one(doc! { "transaction_id": transaction_id.to_string() }),
        )
        .await?;
        Ok(found.is_some())
    }

    async fn insert(&self, entry: &LedgerEntry) -> Result<InsertOutcome, LedgerStoreError> {
        let document = LedgerDocument::from(entry);
        let inserted = tokio::time::timeout(self.deadline, self.collection.insert_one(document))
            .await
            .map_err(|_| LedgerStoreError::Timeout("insert_one"))?;

        match inserted {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_duplicate_key(&e) => Ok(InsertOutcome::AlreadyPresent),
            Err(e) => Err(map_error(&e)),
        }
    }

    async fn list_by_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<LedgerEntry>, LedgerStoreError> {
        self.find_all(doc! { "account_id": account_id }).await
    }

    async fn list(&self, day: Option<NaiveDate>) -> Result<Vec<LedgerEntry>, LedgerStoreError> {
        let filter = match day {
            None => doc! {},
            Some(day) => {
                let (start, end) = day_bounds(day);
                doc! {
                    "created_at": {
                        "$gte": bson::DateTime::from_chrono(start),
                        "$lt": bson::DateTime::from_chrono(end),
                    }
                }
            }
        };
        self.find_all(filter).await
    }

    async fn ping(&self) -> Result<(), LedgerStoreError> {
        bounded(
            self.deadline,
            "ping",
            self.database.run_command(doc! { "ping": 1 }),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry() -> LedgerEntry {
        LedgerEntry {
            id: LedgerEntryId::new(),
            account_id: "A".to_string(),
            amount: dec!(-25.00),
            entry_type: EntryType::Transfer,
            currency: Currency::Usd,
            counterparty: Some("B".to_string()),
            transaction_id: TransactionId::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_document_keeps_decimal_text() {
        let entry = entry();
        let document = LedgerDocument::from(&entry);
        assert_eq!(document.amount, "-25.00");
        assert_eq!(document.transaction_id, entry.transaction_id.to_string());
    }

    #[test]
    fn test_document_maps_back_to_entry() {
        let entry = entry();
        let back = LedgerEntry::try_from(LedgerDocument::from(&entry)).unwrap();
        assert_eq!(back.amount, entry.amount);
        assert_eq!(back.transaction_id, entry.transaction_id);
        assert_eq!(back.counterparty, entry.counterparty);
    }

    #[test]
    fn test_corrupt_amount_is_reported() {
        let mut document = LedgerDocument::from(&entry());
        document.amount = "lots".to_string();
        assert!(matches!(
            LedgerEntry::try_from(document),
            Err(LedgerStoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_document_serializes_created_at_as_bson_datetime() {
        let document = bson::to_document(&LedgerDocument::from(&entry())).unwrap();
        assert!(matches!(
            document.get("created_at"),
            Some(bson::Bson::DateTime(_))
        ));
        assert_eq!(document.get_str("entry_type").unwrap(), "transfer");
    }
}
