//! libSQL-backed local data service.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::accessor::LocalDataAccessor;
use crate::db::{Database, LibSqlRecordRepository, RecordKey};
use crate::error::{Error, Result};
use crate::models::{Budget, EmergencyFund, Expense, ExpenseId, SavingsGoal, SavingsGoalId};

/// Thread-safe service over the local record store.
///
/// Each mutation is a read-modify-write of one collection document performed
/// while holding the connection lock, so concurrent callers never lose each
/// other's writes to the same collection.
#[derive(Clone)]
pub struct LocalDataService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl LocalDataService {
    /// Open a local data service at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::debug!("Opening local store at {}", db_path.display());
        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory local data service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Filesystem path of the database, when file-backed.
    pub fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    async fn load_or_default<T: DeserializeOwned + Default>(&self, key: RecordKey) -> Result<T> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        Ok(repo.load(key).await?.unwrap_or_default())
    }
}

impl LocalDataAccessor for LocalDataService {
    async fn ledger_entries(&self) -> Result<Vec<Expense>> {
        self.load_or_default(RecordKey::LedgerEntries).await
    }

    async fn add_ledger_entry(&self, entry: &Expense) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        let mut entries: Vec<Expense> = repo
            .load(RecordKey::LedgerEntries)
            .await?
            .unwrap_or_default();
        entries.push(entry.clone());
        repo.save(RecordKey::LedgerEntries, &entries).await
    }

    async fn delete_ledger_entry(&self, id: &ExpenseId) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        let mut entries: Vec<Expense> = repo
            .load(RecordKey::LedgerEntries)
            .await?
            .unwrap_or_default();
        let before = entries.len();
        entries.retain(|entry| entry.id != *id);
        if entries.len() == before {
            return Err(Error::NotFound(id.to_string()));
        }
        repo.save(RecordKey::LedgerEntries, &entries).await
    }

    async fn category_limits(&self) -> Result<BTreeMap<String, Budget>> {
        self.load_or_default(RecordKey::CategoryLimits).await
    }

    async fn set_category_limit(&self, category: &str, budget: &Budget) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        let mut limits: BTreeMap<String, Budget> = repo
            .load(RecordKey::CategoryLimits)
            .await?
            .unwrap_or_default();
        limits.insert(category.to_string(), budget.clone());
        repo.save(RecordKey::CategoryLimits, &limits).await
    }

    async fn delete_category_limit(&self, category: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        let mut limits: BTreeMap<String, Budget> = repo
            .load(RecordKey::CategoryLimits)
            .await?
            .unwrap_or_default();
        if limits.remove(category).is_none() {
            return Err(Error::NotFound(category.to_string()));
        }
        repo.save(RecordKey::CategoryLimits, &limits).await
    }

    async fn savings_target(&self) -> Result<Option<EmergencyFund>> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        repo.load(RecordKey::SavingsTarget).await
    }

    async fn set_savings_target(&self, fund: &EmergencyFund) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        repo.save(RecordKey::SavingsTarget, fund).await
    }

    async fn savings_goals(&self) -> Result<Vec<SavingsGoal>> {
        self.load_or_default(RecordKey::SavingsGoals).await
    }

    async fn add_savings_goal(&self, goal: &SavingsGoal) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        let mut goals: Vec<SavingsGoal> = repo
            .load(RecordKey::SavingsGoals)
            .await?
            .unwrap_or_default();
        goals.push(goal.clone());
        repo.save(RecordKey::SavingsGoals, &goals).await
    }

    async fn update_savings_goal(&self, goal: &SavingsGoal) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        let mut goals: Vec<SavingsGoal> = repo
            .load(RecordKey::SavingsGoals)
            .await?
            .unwrap_or_default();
        let existing = goals
            .iter_mut()
            .find(|existing| existing.id == goal.id)
            .ok_or_else(|| Error::NotFound(goal.id.to_string()))?;
        *existing = goal.clone();
        repo.save(RecordKey::SavingsGoals, &goals).await
    }

    async fn delete_savings_goal(&self, id: &SavingsGoalId) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        let mut goals: Vec<SavingsGoal> = repo
            .load(RecordKey::SavingsGoals)
            .await?
            .unwrap_or_default();
        let before = goals.len();
        goals.retain(|goal| goal.id != *id);
        if goals.len() == before {
            return Err(Error::NotFound(id.to_string()));
        }
        repo.save(RecordKey::SavingsGoals, &goals).await
    }
}
