//! Ledger entry model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::record_id;
use crate::util::normalize_text_option;

record_id!(
    /// A unique identifier for a ledger entry
    ExpenseId
);

/// A single spending record in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    /// Unique identifier
    pub id: ExpenseId,
    /// Amount spent, in the user's currency
    pub amount: f64,
    /// Category name (matches category limit keys)
    pub category: String,
    /// Optional free-form note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Calendar date the expense applies to
    pub date: NaiveDate,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl Expense {
    /// Create a new expense dated today
    #[must_use]
    pub fn new(amount: f64, category: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: ExpenseId::new(),
            amount,
            category: category.into().trim().to_string(),
            description: None,
            date: now.date_naive(),
            created_at: now.timestamp_millis(),
        }
    }

    /// Attach a description, dropping blank text
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = normalize_text_option(Some(description.into()));
        self
    }

    /// Override the calendar date
    #[must_use]
    pub const fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }
}
