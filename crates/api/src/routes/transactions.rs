//! Transaction routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;

use tallyflow_core::transaction::{CreateTransactionRequest, TransactionEvent};
use tallyflow_shared::types::ListLimit;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

/// Creates the transaction routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/transactions",
            get(list_transactions).post(create_transaction),
        )
        .route("/transactions/{id}", get(get_transaction))
}

/// Query parameters for listing transactions.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    /// Number of most recent rows, default 100, max 500.
    pub limit: Option<String>,
}

/// POST `/transactions` - Persist a transaction and publish its event.
async fn create_transaction(
    State(state): State<AppState>,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TransactionEvent>)> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let event = state.transactions.create(request).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// GET `/transactions` - Most recent transactions, newest first.
async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<ListTransactionsQuery>,
) -> ApiResult<Json<Vec<TransactionEvent>>> {
    let requested = query
        .limit
        .as_deref()
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map_err(|_| ApiError::bad_request(format!("limit must be a positive integer, got {raw:?}")))
        })
        .transpose()?;
    let limit = ListLimit::from_query(requested).map_err(ApiError::bad_request)?;

    Ok(Json(state.transactions.list(limit).await?))
}

/// GET `/transactions/{id}` - Fetch one transaction.
async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TransactionEvent>> {
    let id = id
        .parse::<i64>()
        .map_err(|_| ApiError::bad_request(format!("Invalid transaction id: {id}")))?;
    Ok(Json(state.transactions.get(id).await?))
}
