//! Savings target model

use serde::{Deserialize, Serialize};

/// The single emergency-fund savings target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyFund {
    /// Amount the user wants set aside
    pub target_amount: f64,
    /// Amount set aside so far
    pub current_amount: f64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl EmergencyFund {
    /// Create a savings target stamped with the current time
    #[must_use]
    pub fn new(target_amount: f64, current_amount: f64) -> Self {
        Self {
            target_amount,
            current_amount,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Fraction of the target reached, clamped to `0.0..=1.0`
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.target_amount <= 0.0 {
            return 0.0;
        }
        (self.current_amount / self.target_amount).clamp(0.0, 1.0)
    }
}
