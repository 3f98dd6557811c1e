//! purse-core - Core library for Purse
//!
//! This crate contains the finance record models, the libSQL-backed local
//! store, remote document stores, and the backup & restore subsystem used by
//! the Purse CLI.

pub mod accessor;
pub mod backup;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod util;

pub use accessor::{LocalDataAccessor, MemoryLocalStore};
pub use backup::{AutoBackupScheduler, BackupEngine, BackupError};
pub use config::{BackupConfig, PayloadProtection};
pub use error::{Error, Result};
pub use models::{Budget, EmergencyFund, Expense, ExpenseId, SavingsGoal, SavingsGoalId};
