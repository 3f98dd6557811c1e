//! Point-in-time snapshot of the local dataset.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SCHEMA_VERSION;
use crate::models::{Budget, EmergencyFund, Expense, SavingsGoal};

/// Summary metadata stored alongside the collections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    /// Number of ledger entries in the snapshot
    pub record_count: usize,
    /// When the snapshot was collected
    pub snapshot_time: DateTime<Utc>,
    /// Snapshot schema version
    pub schema_version: String,
}

/// The four record collections of one user, frozen at collection time.
///
/// Constructed only through [`BackupSnapshot::new`] or
/// [`BackupSnapshot::empty`], which keep `metadata.record_count` equal to the
/// number of ledger entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSnapshot {
    pub ledger_entries: Vec<Expense>,
    pub category_limits: BTreeMap<String, Budget>,
    pub savings_target: Option<EmergencyFund>,
    pub savings_goals: Vec<SavingsGoal>,
    pub metadata: SnapshotMetadata,
}

impl BackupSnapshot {
    #[must_use]
    pub fn new(
        ledger_entries: Vec<Expense>,
        category_limits: BTreeMap<String, Budget>,
        savings_target: Option<EmergencyFund>,
        savings_goals: Vec<SavingsGoal>,
        snapshot_time: DateTime<Utc>,
    ) -> Self {
        let metadata = SnapshotMetadata {
            record_count: ledger_entries.len(),
            snapshot_time,
            schema_version: SCHEMA_VERSION.to_string(),
        };
        Self {
            ledger_entries,
            category_limits,
            savings_target,
            savings_goals,
            metadata,
        }
    }

    /// Well-formed snapshot with every collection empty
    #[must_use]
    pub fn empty(snapshot_time: DateTime<Utc>) -> Self {
        Self::new(Vec::new(), BTreeMap::new(), None, Vec::new(), snapshot_time)
    }

    #[must_use]
    pub fn counts(&self) -> RecordCounts {
        RecordCounts {
            ledger_entries: self.ledger_entries.len(),
            category_limits: self.category_limits.len(),
            savings_goals: self.savings_goals.len(),
            has_savings_target: self.savings_target.is_some(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ledger_entries.is_empty()
            && self.category_limits.is_empty()
            && self.savings_target.is_none()
            && self.savings_goals.is_empty()
    }
}

/// Per-collection record counts reported by backup info
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordCounts {
    pub ledger_entries: usize,
    pub category_limits: usize,
    pub savings_goals: usize,
    pub has_savings_target: bool,
}
