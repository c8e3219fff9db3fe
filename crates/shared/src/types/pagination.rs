//! Limits for "last N" list endpoints.

use serde::{Deserialize, Serialize};

/// Default number of rows returned by list endpoints.
pub const DEFAULT_LIST_LIMIT: u64 = 100;

/// Largest number of rows a single list call may return.
pub const MAX_LIST_LIMIT: u64 = 500;

/// Requested number of most recent rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListLimit(u64);

impl Default for ListLimit {
    fn default() -> Self {
        Self(DEFAULT_LIST_LIMIT)
    }
}

impl ListLimit {
    /// Builds a limit from an optional query value.
    ///
    /// Missing values fall back to the default; values above the maximum are clamped.
    ///
    /// # Errors
    ///
    /// Returns an error if the requested limit is zero.
    pub fn from_query(requested: Option<u64>) -> Result<Self, String> {
        match requested {
            None => Ok(Self::default()),
            Some(0) => Err("limit must be at least 1".to_string()),
            Some(n) => Ok(Self(n.min(MAX_LIST_LIMIT))),
        }
    }

    /// Returns the limit for database queries.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}
