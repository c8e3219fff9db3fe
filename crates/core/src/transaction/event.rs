//! Wire payload published for every persisted transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tallyflow_shared::types::{Currency, TransactionId};

use super::error::EventDecodeError;
use super::types::{TransactionStatus, TransactionType};

/// Transaction event as carried in the broker `payload` field.
///
/// `amount` is encoded as a decimal string and timestamps as RFC 3339.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEvent {
    /// Relational row id.
    pub id: i64,
    /// Client-independent id, also the ledger idempotency key.
    pub transaction_id: TransactionId,
    /// Positive amount.
    pub amount: Decimal,
    /// Currency code.
    pub currency: Currency,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Debited account reference.
    pub source_account: String,
    /// Credited account reference.
    pub destination_account: String,
    /// Type tag.
    pub transaction_type: TransactionType,
    /// Status at publish time.
    pub status: TransactionStatus,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Row update time.
    pub updated_at: DateTime<Utc>,
}

impl TransactionEvent {
    /// Serializes the event to its JSON payload.
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decodes and sanity-checks a JSON payload.
    ///
    /// Unknown type tags and currencies fail here, so the record is
    /// redelivered and eventually dead-lettered rather than silently dropped.
    pub fn from_payload(payload: &str) -> Result<Self, EventDecodeError> {
        let event: Self = serde_json::from_str(payload)?;
        if event.amount <= Decimal::ZERO {
            return Err(EventDecodeError::NonPositiveAmount(
                event.transaction_id.to_string(),
            ));
        }
        if event.source_account.trim().is_empty() && event.destination_account.trim().is_empty() {
            return Err(EventDecodeError::MissingAccount(
                event.transaction_id.to_string(),
            ));
        }
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn event() -> TransactionEvent {
        let now = Utc::now();
        TransactionEvent {
            id: 42,
            transaction_id: TransactionId::new(),
            amount: dec!(25.00),
            currency: Currency::Usd,
            description: "Lunch".to_string(),
            source_account: "A".to_string(),
            destination_account: "B".to_string(),
            transaction_type: TransactionType::Transfer,
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_payload_field_encoding() {
        let event = event();
        let value: serde_json::Value = serde_json::from_str(&event.to_payload().unwrap()).unwrap();
        assert_eq!(value["amount"], "25.00");
        assert_eq!(value["currency"], "USD");
        assert_eq!(value["transaction_type"], "transfer");
        assert_eq!(value["status"], "pending");
        assert_eq!(value["transaction_id"], event.transaction_id.to_string());
        assert!(value["created_at"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_decode_accepts_own_payload() {
        let event = event();
        let decoded = TransactionEvent::from_payload(&event.to_payload().unwrap()).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let payload = event()
            .to_payload()
            .unwrap()
            .replace("\"transfer\"", "\"refund\"");
        assert!(matches!(
            TransactionEvent::from_payload(&payload),
            Err(EventDecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            TransactionEvent::from_payload("not json"),
            Err(EventDecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_zero_amount() {
        let payload = event()
            .to_payload()
            .unwrap()
            .replace("\"25.00\"", "\"0\"");
        assert!(matches!(
            TransactionEvent::from_payload(&payload),
            Err(EventDecodeError::NonPositiveAmount(_))
        ));
    }
}
