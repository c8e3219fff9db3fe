//! Transaction status and type tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction status.
///
/// Rows are created as `Pending`. Moving to `Completed` or `Failed` is left
/// to a reconciliation process outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Persisted, settlement not confirmed.
    #[default]
    Pending,
    /// Settled.
    Completed,
    /// Rejected by a downstream system.
    Failed,
}

impl TransactionStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money entering the destination account from outside.
    Deposit,
    /// Generic credit to the destination account.
    Credit,
    /// Money leaving the source account.
    Withdrawal,
    /// Generic debit of the source account.
    Debit,
    /// Payment out of the source account.
    Payment,
    /// Movement from the source account to the destination account.
    Transfer,
}

impl TransactionType {
    /// All known types, in display order.
    pub const ALL: [Self; 6] = [
        Self::Deposit,
        Self::Credit,
        Self::Withdrawal,
        Self::Debit,
        Self::Payment,
        Self::Transfer,
    ];

    /// Returns the string representation of the type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Credit => "credit",
            Self::Withdrawal => "withdrawal",
            Self::Debit => "debit",
            Self::Payment => "payment",
            Self::Transfer => "transfer",
        }
    }

    /// Parses a type from a string, ignoring case and surrounding whitespace.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("deposit", Some(TransactionType::Deposit))]
    #[case(" Transfer ", Some(TransactionType::Transfer))]
    #[case("PAYMENT", Some(TransactionType::Payment))]
    #[case("refund", None)]
    #[case("", None)]
    fn test_type_parse(#[case] input: &str, #[case] expected: Option<TransactionType>) {
        assert_eq!(TransactionType::parse(input), expected);
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
        ] {
            assert_eq!(TransactionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TransactionStatus::parse("posted"), None);
    }

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(TransactionStatus::default(), TransactionStatus::Pending);
    }
}
