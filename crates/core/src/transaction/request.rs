//! Create-transaction request and its validated form.

use rust_decimal::Decimal;
use serde::Deserialize;
use tallyflow_shared::types::{Currency, fits_money_scale};
use validator::{Validate, ValidationError};

use super::error::TransactionValidationError;
use super::types::TransactionType;

/// Request body for creating a transaction.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTransactionRequest {
    /// Positive amount.
    #[validate(custom(function = "validate_positive_amount"))]
    pub amount: Decimal,
    /// ISO currency code, `USD` when omitted.
    #[validate(length(equal = 3, message = "currency must be a 3-letter code"))]
    pub currency: Option<String>,
    /// Free-form description.
    #[serde(default)]
    #[validate(length(max = 500, message = "description must be at most 500 characters"))]
    pub description: String,
    /// Debited account reference.
    #[validate(length(min = 1, max = 64, message = "source_account is required"))]
    pub source_account: String,
    /// Credited account reference.
    #[validate(length(min = 1, max = 64, message = "destination_account is required"))]
    pub destination_account: String,
    /// Type tag, one of the known [`TransactionType`] values.
    #[validate(length(min = 1, max = 32, message = "transaction_type is required"))]
    pub transaction_type: String,
}

fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        return Err(ValidationError::new("non_positive_amount")
            .with_message("amount must be positive".into()));
    }
    Ok(())
}

/// A transaction that passed shape and domain validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    /// Positive amount at stored scale.
    pub amount: Decimal,
    /// Currency, defaulted to USD.
    pub currency: Currency,
    /// Description.
    pub description: String,
    /// Debited account reference.
    pub source_account: String,
    /// Credited account reference.
    pub destination_account: String,
    /// Type tag.
    pub transaction_type: TransactionType,
}

impl CreateTransactionRequest {
    /// Runs the derive checks followed by domain checks.
    pub fn into_new_transaction(self) -> Result<NewTransaction, TransactionValidationError> {
        if self.amount <= Decimal::ZERO {
            return Err(TransactionValidationError::NonPositiveAmount);
        }
        self.validate()
            .map_err(|e| TransactionValidationError::InvalidShape(describe(&e)))?;

        if !fits_money_scale(self.amount) {
            return Err(TransactionValidationError::ExcessScale);
        }

        let source_account = self.source_account.trim().to_string();
        let destination_account = self.destination_account.trim().to_string();
        if source_account.is_empty() || destination_account.is_empty() {
            return Err(TransactionValidationError::InvalidShape(
                "source_account and destination_account are required".into(),
            ));
        }
        if source_account == destination_account {
            return Err(TransactionValidationError::SameAccount);
        }

        let transaction_type = TransactionType::parse(&self.transaction_type)
            .ok_or_else(|| TransactionValidationError::UnknownType(self.transaction_type.clone()))?;

        let currency = match self.currency.as_deref() {
            None => Currency::default(),
            Some(code) => code
                .parse::<Currency>()
                .map_err(|_| TransactionValidationError::UnknownCurrency(code.to_string()))?,
        };

        Ok(NewTransaction {
            amount: self.amount,
            currency,
            description: self.description.trim().to_string(),
            source_account,
            destination_account,
            transaction_type,
        })
    }
}

/// Flattens validator output into one message, sorted by field for stable text.
fn describe(errors: &validator::ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .iter()
        .map(|(field, errs)| {
            errs.iter()
                .find_map(|e| e.message.as_ref().map(ToString::to_string))
                .unwrap_or_else(|| format!("{field} is invalid"))
        })
        .collect();
    parts.sort();
    parts.join("; ")
}
