//! Account routes: creation, lookup, and direct transfers.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tallyflow_core::account::AccountId;
use tallyflow_db::TransferOutcome;
use tallyflow_db::entities::accounts;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

/// Creates the account routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/accounts", post(create_account))
        .route("/accounts/transfers", post(transfer))
        .route("/accounts/{id}", get(get_account))
}

/// Request body for opening an account.
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    /// Owner display name.
    pub owner: String,
    /// ISO currency code, `USD` when omitted.
    pub currency: Option<String>,
    /// Opening balance, zero when omitted.
    #[serde(default)]
    pub initial_balance: Decimal,
}

/// Request body for a transfer.
#[derive(Debug, Deserialize)]
pub struct TransferRequestBody {
    /// Debited account.
    pub from_account_id: AccountId,
    /// Credited account.
    pub to_account_id: AccountId,
    /// Positive amount.
    pub amount: Decimal,
}

/// Response for an account.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    /// Account ID.
    pub id: AccountId,
    /// Owner name.
    pub owner: String,
    /// Current balance.
    pub balance: Decimal,
    /// Currency code.
    pub currency: String,
    /// Created at timestamp.
    pub created_at: String,
    /// Updated at timestamp.
    pub updated_at: String,
}

impl From<accounts::Model> for AccountResponse {
    fn from(model: accounts::Model) -> Self {
        Self {
            id: model.id,
            owner: model.owner,
            balance: model.balance,
            currency: model.currency,
            created_at: model.created_at.to_rfc3339(),
            updated_at: model.updated_at.to_rfc3339(),
        }
    }
}

/// Response for a committed transfer.
#[derive(Debug, Serialize)]
pub struct TransferResponse {
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

impl From<TransferOutcome> for TransferResponse {
    fn from(outcome: TransferOutcome) -> Self {
        Self {
            from_account_id: outcome.from_account_id,
            to_account_id: outcome.to_account_id,
            amount: outcome.amount,
            from_balance: outcome.from_balance,
            to_balance: outcome.to_balance,
        }
    }
}

/// POST `/accounts` - Open an account.
async fn create_account(
    State(state): State<AppState>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AccountResponse>)> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let account = state
        .accounts
        .create(
            &request.owner,
            request.currency.as_deref(),
            request.initial_balance,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(account.into())))
}

/// GET `/accounts/{id}` - Fetch one account.
async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AccountResponse>> {
    let id = id
        .parse::<AccountId>()
        .map_err(|_| ApiError::bad_request(format!("Invalid account id: {id}")))?;
    Ok(Json(state.accounts.get(id).await?.into()))
}

/// POST `/accounts/transfers` - Move balance between two accounts.
async fn transfer(
    State(state): State<AppState>,
    payload: Result<Json<TransferRequestBody>, JsonRejection>,
) -> ApiResult<Json<TransferResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let outcome = state
        .accounts
        .transfer(
            request.from_account_id,
            request.to_account_id,
            request.amount,
        )
        .await?;
    Ok(Json(outcome.into()))
}
