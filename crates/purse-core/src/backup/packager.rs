//! Collects the local collections into a [`BackupSnapshot`].

use chrono::Utc;

use super::BackupSnapshot;
use crate::accessor::LocalDataAccessor;

/// A collection that could not be read and was backed up as empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionFailure {
    pub collection: &'static str,
    pub cause: String,
}

/// Result of collecting the local dataset
#[derive(Debug, Clone, PartialEq)]
pub enum Collected {
    Complete(BackupSnapshot),
    /// At least one collection read failed and was replaced by its empty default
    Degraded {
        snapshot: BackupSnapshot,
        causes: Vec<CollectionFailure>,
    },
}

impl Collected {
    pub const fn snapshot(&self) -> &BackupSnapshot {
        match self {
            Self::Complete(snapshot) | Self::Degraded { snapshot, .. } => snapshot,
        }
    }

    pub fn into_snapshot(self) -> BackupSnapshot {
        match self {
            Self::Complete(snapshot) | Self::Degraded { snapshot, .. } => snapshot,
        }
    }

    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

fn tolerate<T: Default>(
    collection: &'static str,
    result: crate::Result<T>,
    causes: &mut Vec<CollectionFailure>,
) -> T {
    result.unwrap_or_else(|error| {
        tracing::warn!("Backing up {collection} as empty after read failure: {error}");
        causes.push(CollectionFailure {
            collection,
            cause: error.to_string(),
        });
        T::default()
    })
}

/// Read all four collections. Never fails: an unreadable collection resolves
/// to its empty default and is recorded in [`Collected::Degraded`].
pub async fn collect<A: LocalDataAccessor>(accessor: &A) -> Collected {
    let mut causes = Vec::new();

    let ledger_entries = tolerate("ledgerEntries", accessor.ledger_entries().await, &mut causes);
    let category_limits =
        tolerate("categoryLimits", accessor.category_limits().await, &mut causes);
    let savings_target = tolerate("savingsTarget", accessor.savings_target().await, &mut causes);
    let savings_goals = tolerate("savingsGoals", accessor.savings_goals().await, &mut causes);

    let snapshot = BackupSnapshot::new(
        ledger_entries,
        category_limits,
        savings_target,
        savings_goals,
        Utc::now(),
    );

    if causes.is_empty() {
        Collected::Complete(snapshot)
    } else {
        Collected::Degraded { snapshot, causes }
    }
}
