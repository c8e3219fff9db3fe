//! Ledger read routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;

use tallyflow_core::ledger::LedgerEntry;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

/// Creates the ledger routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ledger", get(list_entries))
        .route("/ledger/", get(list_entries))
        .route("/ledger/account/", get(missing_account))
        .route("/ledger/account/{account_id}", get(entries_for_account))
}

/// Query parameters for listing entries.
#[derive(Debug, Deserialize)]
pub struct LedgerQueryParams {
    /// UTC day, `YYYY-MM-DD`.
    pub date: Option<String>,
}

/// GET `/ledger/account/{account_id}` - Entries posted on one account.
async fn entries_for_account(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> ApiResult<Json<Vec<LedgerEntry>>> {
    Ok(Json(state.ledger.by_account(&account_id).await?))
}

async fn missing_account() -> ApiError {
    ApiError::bad_request("account id is required")
}

/// GET `/ledger/?date=YYYY-MM-DD` - Entries for one day, or all entries.
async fn list_entries(
    State(state): State<AppState>,
    Query(params): Query<LedgerQueryParams>,
) -> ApiResult<Json<Vec<LedgerEntry>>> {
    Ok(Json(state.ledger.by_date(params.date.as_deref()).await?))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{empty_db, get, json_body, send, state};
    use axum::http::StatusCode;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use tallyflow_core::ledger::{EntryType, LedgerEntry};
    use tallyflow_docstore::{InMemoryLedgerStore, LedgerStore};
    use tallyflow_messaging::InMemoryBroker;
    use tallyflow_shared::types::{Currency, LedgerEntryId, TransactionId};

    async fn store_with_entries() -> InMemoryLedgerStore {
        let store = InMemoryLedgerStore::new();
        for (account, day) in [("A", 10), ("B", 10), ("A", 11)] {
            store
                .insert(&LedgerEntry {
                    id: LedgerEntryId::new(),
                    account_id: account.to_string(),
                    amount: dec!(7.25),
                    entry_type: EntryType::Credit,
                    currency: Currency::Usd,
                    counterparty: Some("EXT".to_string()),
                    transaction_id: TransactionId::new(),
                    created_at: Utc.with_ymd_and_hms(2026, 8, day, 12, 0, 0).unwrap(),
                })
                .await
                .unwrap();
        }
        store
    }

    #[rstest]
    #[case("/api/v1/ledger/account/A", 2)]
    #[case("/api/v1/ledger/account/Z", 0)]
    #[case("/api/v1/ledger/?date=2026-08-10", 2)]
    #[case("/api/v1/ledger?date=2026-08-11", 1)]
    #[case("/api/v1/ledger/", 3)]
    #[tokio::test]
    async fn test_filters(#[case] uri: &str, #[case] expected: usize) {
        let broker = InMemoryBroker::new();
        let store = store_with_entries().await;

        let response = send(state(empty_db(), &broker, &store), get(uri)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await.as_array().unwrap().len(), expected);
    }

    #[rstest]
    #[case("/api/v1/ledger/?date=10-08-2026")]
    #[case("/api/v1/ledger/account/")]
    #[tokio::test]
    async fn test_bad_input_is_400(#[case] uri: &str) {
        let broker = InMemoryBroker::new();
        let store = InMemoryLedgerStore::new();

        let response = send(state(empty_db(), &broker, &store), get(uri)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_store_failure_is_500() {
        let broker = InMemoryBroker::new();
        let store = InMemoryLedgerStore::new();
        store.fail_next_reads(1);

        let response = send(state(empty_db(), &broker, &store), get("/api/v1/ledger/")).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
