//! Local data accessor seam
//!
//! The backup subsystem never owns local persistence. It reads and writes the
//! four record collections through [`LocalDataAccessor`], which the host
//! application implements over its local store.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::{Budget, EmergencyFund, Expense, ExpenseId, SavingsGoal, SavingsGoalId};

/// Read/write access to the local financial dataset.
pub trait LocalDataAccessor: Send + Sync {
    /// All ledger entries, in insertion order
    fn ledger_entries(&self) -> impl Future<Output = Result<Vec<Expense>>> + Send;

    /// Append a ledger entry
    fn add_ledger_entry(&self, entry: &Expense) -> impl Future<Output = Result<()>> + Send;

    /// Remove a ledger entry by id
    fn delete_ledger_entry(&self, id: &ExpenseId) -> impl Future<Output = Result<()>> + Send;

    /// Category limits keyed by category name
    fn category_limits(&self) -> impl Future<Output = Result<BTreeMap<String, Budget>>> + Send;

    /// Insert or overwrite the limit for one category
    fn set_category_limit(
        &self,
        category: &str,
        budget: &Budget,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove the limit for one category
    fn delete_category_limit(&self, category: &str) -> impl Future<Output = Result<()>> + Send;

    /// The savings target, if one was ever set
    fn savings_target(&self) -> impl Future<Output = Result<Option<EmergencyFund>>> + Send;

    /// Overwrite the savings target
    fn set_savings_target(&self, fund: &EmergencyFund)
        -> impl Future<Output = Result<()>> + Send;

    /// All savings goals, in insertion order
    fn savings_goals(&self) -> impl Future<Output = Result<Vec<SavingsGoal>>> + Send;

    /// Append a savings goal
    fn add_savings_goal(&self, goal: &SavingsGoal) -> impl Future<Output = Result<()>> + Send;

    /// Replace an existing savings goal with the same id
    fn update_savings_goal(&self, goal: &SavingsGoal) -> impl Future<Output = Result<()>> + Send;

    /// Remove a savings goal by id
    fn delete_savings_goal(&self, id: &SavingsGoalId)
        -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Default)]
struct MemoryRecords {
    ledger_entries: Vec<Expense>,
    category_limits: BTreeMap<String, Budget>,
    savings_target: Option<EmergencyFund>,
    savings_goals: Vec<SavingsGoal>,
}

/// In-process accessor, for tests and for hosts that keep state in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLocalStore {
    records: Arc<Mutex<MemoryRecords>>,
}

impl MemoryLocalStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalDataAccessor for MemoryLocalStore {
    async fn ledger_entries(&self) -> Result<Vec<Expense>> {
        Ok(self.records.lock().await.ledger_entries.clone())
    }

    async fn add_ledger_entry(&self, entry: &Expense) -> Result<()> {
        self.records.lock().await.ledger_entries.push(entry.clone());
        Ok(())
    }

    async fn delete_ledger_entry(&self, id: &ExpenseId) -> Result<()> {
        let mut records = self.records.lock().await;
        let before = records.ledger_entries.len();
        records.ledger_entries.retain(|entry| entry.id != *id);
        if records.ledger_entries.len() == before {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn category_limits(&self) -> Result<BTreeMap<String, Budget>> {
        Ok(self.records.lock().await.category_limits.clone())
    }

    async fn set_category_limit(&self, category: &str, budget: &Budget) -> Result<()> {
        self.records
            .lock()
            .await
            .category_limits
            .insert(category.to_string(), budget.clone());
        Ok(())
    }

    async fn delete_category_limit(&self, category: &str) -> Result<()> {
        self.records
            .lock()
            .await
            .category_limits
            .remove(category)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(category.to_string()))
    }

    async fn savings_target(&self) -> Result<Option<EmergencyFund>> {
        Ok(self.records.lock().await.savings_target.clone())
    }

    async fn set_savings_target(&self, fund: &EmergencyFund) -> Result<()> {
        self.records.lock().await.savings_target = Some(fund.clone());
        Ok(())
    }

    async fn savings_goals(&self) -> Result<Vec<SavingsGoal>> {
        Ok(self.records.lock().await.savings_goals.clone())
    }

    async fn add_savings_goal(&self, goal: &SavingsGoal) -> Result<()> {
        self.records.lock().await.savings_goals.push(goal.clone());
        Ok(())
    }

    async fn update_savings_goal(&self, goal: &SavingsGoal) -> Result<()> {
        let mut records = self.records.lock().await;
        let existing = records
            .savings_goals
            .iter_mut()
            .find(|existing| existing.id == goal.id)
            .ok_or_else(|| Error::NotFound(goal.id.to_string()))?;
        *existing = goal.clone();
        Ok(())
    }

    async fn delete_savings_goal(&self, id: &SavingsGoalId) -> Result<()> {
        let mut records = self.records.lock().await;
        let before = records.savings_goals.len();
        records.savings_goals.retain(|goal| goal.id != *id);
        if records.savings_goals.len() == before {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_starts_empty() {
        let store = MemoryLocalStore::new();
        assert!(store.ledger_entries().await.unwrap().is_empty());
        assert!(store.category_limits().await.unwrap().is_empty());
        assert!(store.savings_target().await.unwrap().is_none());
        assert!(store.savings_goals().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_category_limit_overwrites_by_key() {
        let store = MemoryLocalStore::new();
        store
            .set_category_limit("Food & Dining", &Budget::new(4000.0))
            .await
            .unwrap();
        store
            .set_category_limit("Food & Dining", &Budget::new(5000.0))
            .await
            .unwrap();

        let limits = store.category_limits().await.unwrap();
        assert_eq!(limits.len(), 1);
        assert!((limits["Food & Dining"].amount - 5000.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn update_missing_goal_is_not_found() {
        let store = MemoryLocalStore::new();
        let goal = SavingsGoal::new("Bike", 900.0);
        let result = store.update_savings_goal(&goal).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_ledger_entry_removes_only_matching_id() {
        let store = MemoryLocalStore::new();
        let keep = Expense::new(10.0, "Transport");
        let drop = Expense::new(20.0, "Shopping");
        store.add_ledger_entry(&keep).await.unwrap();
        store.add_ledger_entry(&drop).await.unwrap();

        store.delete_ledger_entry(&drop.id).await.unwrap();

        let remaining = store.ledger_entries().await.unwrap();
        assert_eq!(remaining, vec![keep]);
        assert!(store.delete_ledger_entry(&drop.id).await.is_err());
    }
}
