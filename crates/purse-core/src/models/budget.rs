//! Category limit model

use serde::{Deserialize, Serialize};

/// Monthly spending limit for one category.
///
/// Budgets are keyed by category name in the local store, so the name is not
/// repeated inside the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    /// Limit amount
    pub amount: f64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl Budget {
    /// Create a budget stamped with the current time
    #[must_use]
    pub fn new(amount: f64) -> Self {
        Self {
            amount,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}
