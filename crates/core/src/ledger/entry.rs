//! Ledger entry domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tallyflow_shared::types::{Currency, LedgerEntryId, TransactionId};

use crate::transaction::{TransactionEvent, TransactionType};

/// Type of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Money added to the account.
    Credit,
    /// Money removed from the account.
    Debit,
    /// Outgoing leg of a transfer, posted on the source account.
    Transfer,
}

impl EntryType {
    /// Returns the string representation of the entry type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
            Self::Transfer => "transfer",
        }
    }
}

/// A single ledger entry.
///
/// Exactly one entry is written per transaction event; `transaction_id` is
/// the idempotency key and is unique in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique identifier for this entry.
    pub id: LedgerEntryId,
    /// Account the entry is posted on.
    pub account_id: String,
    /// Signed amount: positive for credits, negative otherwise.
    pub amount: Decimal,
    /// Entry classification.
    pub entry_type: EntryType,
    /// Currency code.
    pub currency: Currency,
    /// The other side of the movement, if any.
    pub counterparty: Option<String>,
    /// Source transaction.
    pub transaction_id: TransactionId,
    /// When the entry was materialized.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Derives the entry for a decoded event.
    ///
    /// | type                         | account     | entry    | amount |
    /// |------------------------------|-------------|----------|--------|
    /// | deposit, credit              | destination | credit   | +a     |
    /// | withdrawal, debit, payment   | source      | debit    | -a     |
    /// | transfer                     | source      | transfer | -a     |
    #[must_use]
    pub fn from_event(event: &TransactionEvent, created_at: DateTime<Utc>) -> Self {
        let (account_id, counterparty, entry_type, amount) = match event.transaction_type {
            TransactionType::Deposit | TransactionType::Credit => (
                &event.destination_account,
                &event.source_account,
                EntryType::Credit,
                event.amount,
            ),
            TransactionType::Withdrawal | TransactionType::Debit | TransactionType::Payment => (
                &event.source_account,
                &event.destination_account,
                EntryType::Debit,
                -event.amount,
            ),
            TransactionType::Transfer => (
                &event.source_account,
                &event.destination_account,
                EntryType::Transfer,
                -event.amount,
            ),
        };

        let counterparty = Some(counterparty.trim())
            .filter(|c| !c.is_empty())
            .map(ToString::to_string);

        Self {
            id: LedgerEntryId::new(),
            account_id: account_id.clone(),
            amount,
            entry_type,
            currency: event.currency,
            counterparty,
            transaction_id: event.transaction_id,
            created_at,
        }
    }

    /// Returns true if the entry adds money to its account.
    #[must_use]
    pub fn is_credit(&self) -> bool {
        self.amount > Decimal::ZERO
    }
}
