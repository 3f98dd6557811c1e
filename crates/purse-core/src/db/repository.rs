//! Key-value record repository
//!
//! Every record collection lives as one JSON document in `kv_store`, keyed by
//! [`RecordKey`]. Reads of a key that was never written return `None`.

use libsql::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Storage keys for the four record collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKey {
    LedgerEntries,
    CategoryLimits,
    SavingsTarget,
    SavingsGoals,
}

impl RecordKey {
    /// Key string used in `kv_store`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LedgerEntries => "expenses",
            Self::CategoryLimits => "budgets",
            Self::SavingsTarget => "emergency_fund",
            Self::SavingsGoals => "savings_goals",
        }
    }
}

/// libSQL implementation of the record store
pub struct LibSqlRecordRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlRecordRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Load and decode the document stored under `key`
    pub async fn load<T: DeserializeOwned>(&self, key: RecordKey) -> Result<Option<T>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM kv_store WHERE key = ?", [key.as_str()])
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let raw: String = row.get(0)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Encode and store `value` under `key`, replacing any previous document
    pub async fn save<T: Serialize + ?Sized>(&self, key: RecordKey, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        let now = chrono::Utc::now().timestamp_millis();
        self.conn
            .execute(
                "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)",
                libsql::params![key.as_str(), raw, now],
            )
            .await?;
        Ok(())
    }
}
