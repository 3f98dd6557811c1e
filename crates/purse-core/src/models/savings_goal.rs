//! Savings goal model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::record_id;

record_id!(
    /// A unique identifier for a savings goal
    SavingsGoalId
);

/// Priority options for a savings goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GoalPriority {
    Low,
    #[default]
    Medium,
    High,
}

/// A named goal the user is saving towards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsGoal {
    /// Unique identifier
    pub id: SavingsGoalId,
    /// Display name
    pub name: String,
    /// Amount to reach
    pub target_amount: f64,
    /// Amount saved so far
    pub current_amount: f64,
    /// Optional date the user wants to reach the goal by
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
    /// Optional grouping category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Optional priority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<GoalPriority>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl SavingsGoal {
    /// Create a new goal with nothing saved yet
    #[must_use]
    pub fn new(name: impl Into<String>, target_amount: f64) -> Self {
        Self {
            id: SavingsGoalId::new(),
            name: name.into().trim().to_string(),
            target_amount,
            current_amount: 0.0,
            target_date: None,
            category: None,
            priority: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Add a contribution to the goal
    pub fn contribute(&mut self, amount: f64) {
        self.current_amount += amount;
    }

    /// Whether the saved amount has reached the target
    #[must_use]
    pub fn is_reached(&self) -> bool {
        self.current_amount >= self.target_amount
    }
}
