//! Shape checks applied to a fetched snapshot before it touches local data.

use std::fmt;

use super::BackupSnapshot;
use crate::util::is_valid_amount;

/// A problem found in a restored snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeIssue {
    BlankCategory { category: String },
    InvalidLimitAmount { category: String, amount: f64 },
    InvalidSavingsTarget { target_amount: f64, current_amount: f64 },
    /// Declared count differs from the ledger length. Logged only.
    RecordCountMismatch { declared: usize, actual: usize },
}

impl ShapeIssue {
    /// Category limit this issue disqualifies, if any
    pub fn skipped_category(&self) -> Option<&str> {
        match self {
            Self::BlankCategory { category } | Self::InvalidLimitAmount { category, .. } => {
                Some(category)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ShapeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlankCategory { .. } => write!(f, "category limit with a blank name"),
            Self::InvalidLimitAmount { category, amount } => {
                write!(f, "category limit {category:?} has invalid amount {amount}")
            }
            Self::InvalidSavingsTarget {
                target_amount,
                current_amount,
            } => write!(
                f,
                "savings target has invalid amounts ({target_amount}, {current_amount})"
            ),
            Self::RecordCountMismatch { declared, actual } => write!(
                f,
                "metadata declares {declared} ledger entries but snapshot has {actual}"
            ),
        }
    }
}

/// Check the overwrite-safe collections and snapshot metadata.
pub fn validate_snapshot(snapshot: &BackupSnapshot) -> Vec<ShapeIssue> {
    let mut issues = Vec::new();

    for (category, budget) in &snapshot.category_limits {
        if category.trim().is_empty() {
            issues.push(ShapeIssue::BlankCategory {
                category: category.clone(),
            });
        } else if !is_valid_amount(budget.amount) {
            issues.push(ShapeIssue::InvalidLimitAmount {
                category: category.clone(),
                amount: budget.amount,
            });
        }
    }

    if let Some(target) = &snapshot.savings_target {
        if !is_valid_amount(target.target_amount) || !is_valid_amount(target.current_amount) {
            issues.push(ShapeIssue::InvalidSavingsTarget {
                target_amount: target.target_amount,
                current_amount: target.current_amount,
            });
        }
    }

    let actual = snapshot.ledger_entries.len();
    if snapshot.metadata.record_count != actual {
        issues.push(ShapeIssue::RecordCountMismatch {
            declared: snapshot.metadata.record_count,
            actual,
        });
    }

    issues
}

/// Whether an envelope written with `version` can be restored.
///
/// Only the major component is compared.
pub fn is_supported_schema(version: &str) -> bool {
    let major = version.trim().split('.').next().unwrap_or_default();
    major == super::SCHEMA_VERSION.split('.').next().unwrap_or_default()
}
