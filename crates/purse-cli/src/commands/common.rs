use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use purse_core::backup::BackupEngine;
use purse_core::remote::{FileBackupStore, HttpBackupStore, RemoteBackupStore};
use purse_core::services::LocalDataService;
use purse_core::util::is_valid_amount;
use purse_core::{BackupConfig, Budget, Expense, PayloadProtection, SavingsGoal};
use serde::Serialize;
use serde_json::Value;

use crate::config_profiles::{normalize_text_option, CliProfile, CliProfilesConfig, RemoteKind};
use crate::error::CliError;

/// Remote store selected by the active profile
#[derive(Debug, Clone)]
pub enum ProfileRemote {
    File(FileBackupStore),
    Http(HttpBackupStore),
}

impl RemoteBackupStore for ProfileRemote {
    async fn upsert_document(
        &self,
        collection: &str,
        key: &str,
        value: &Value,
    ) -> purse_core::Result<()> {
        match self {
            Self::File(store) => store.upsert_document(collection, key, value).await,
            Self::Http(store) => store.upsert_document(collection, key, value).await,
        }
    }

    async fn get_document(&self, collection: &str, key: &str) -> purse_core::Result<Option<Value>> {
        match self {
            Self::File(store) => store.get_document(collection, key).await,
            Self::Http(store) => store.get_document(collection, key).await,
        }
    }

    async fn document_exists(&self, collection: &str, key: &str) -> purse_core::Result<bool> {
        match self {
            Self::File(store) => store.document_exists(collection, key).await,
            Self::Http(store) => store.document_exists(collection, key).await,
        }
    }
}

pub type CliEngine = BackupEngine<LocalDataService, ProfileRemote>;

/// Settings resolved from flags, environment and the active profile.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub profile_name: String,
    pub profile: CliProfile,
    pub db_path: PathBuf,
    identity_key: Option<String>,
}

impl CommandContext {
    pub fn resolve(
        cli_db_path: Option<PathBuf>,
        explicit_profile: Option<&str>,
        identity_key: Option<String>,
    ) -> Result<Self, CliError> {
        let config = CliProfilesConfig::load().map_err(CliError::Config)?;
        let profile_name = config.resolve_profile_name(explicit_profile);
        let profile = config.profile(&profile_name).cloned().unwrap_or_default();
        Self::from_profile(profile_name, profile, cli_db_path, identity_key)
    }

    pub fn from_profile(
        profile_name: String,
        profile: CliProfile,
        cli_db_path: Option<PathBuf>,
        identity_key: Option<String>,
    ) -> Result<Self, CliError> {
        let db_path = match cli_db_path.or_else(|| profile.db_path()) {
            Some(path) => path,
            None => resolve_db_path()?,
        };
        let identity_key = normalize_text_option(identity_key)
            .or_else(|| normalize_text_option(env::var("PURSE_IDENTITY_KEY").ok()));
        Ok(Self {
            profile_name,
            profile,
            db_path,
            identity_key,
        })
    }

    pub async fn open_local(&self) -> Result<LocalDataService, CliError> {
        Ok(LocalDataService::open_path(self.db_path.clone()).await?)
    }

    pub fn user_id(&self) -> Result<String, CliError> {
        self.profile.user_id().ok_or(CliError::MissingUserId)
    }

    /// Identity key for backup and restore. Plaintext profiles do not need one.
    pub fn identity_key(&self) -> Result<&str, CliError> {
        match (self.profile.protection, self.identity_key.as_deref()) {
            (_, Some(key)) => Ok(key),
            (PayloadProtection::Plaintext, None) => Ok(""),
            (PayloadProtection::Sealed, None) => Err(CliError::MissingIdentityKey),
        }
    }

    pub fn backup_config(&self) -> BackupConfig {
        let config = BackupConfig::default().with_protection(self.profile.protection);
        match self.profile.restore_timeout_secs {
            Some(secs) => config.with_restore_timeout(Duration::from_secs(secs)),
            None => config,
        }
    }

    pub fn open_remote(&self) -> Result<ProfileRemote, CliError> {
        match self.profile.remote_kind {
            RemoteKind::File => {
                let root = match self.profile.remote() {
                    Some(location) => PathBuf::from(location),
                    None => default_backup_dir()?,
                };
                Ok(ProfileRemote::File(FileBackupStore::new(root)))
            }
            RemoteKind::Http => {
                let base_url = self.profile.remote().ok_or_else(|| {
                    CliError::Config(format!(
                        "Profile '{}' uses an http remote but has no URL",
                        self.profile_name
                    ))
                })?;
                let token = normalize_text_option(env::var("PURSE_REMOTE_TOKEN").ok());
                Ok(ProfileRemote::Http(HttpBackupStore::new(base_url, token)?))
            }
        }
    }

    pub fn engine(&self, local: LocalDataService) -> Result<CliEngine, CliError> {
        Ok(BackupEngine::new(
            local,
            self.open_remote()?,
            self.backup_config(),
        ))
    }
}

/// Run a backup right after a change when `--backup` was given.
pub async fn backup_after_change(
    requested: bool,
    context: &CommandContext,
    local: &LocalDataService,
) -> Result<(), CliError> {
    if !requested {
        return Ok(());
    }
    let user_id = context.user_id()?;
    let identity_key = context.identity_key()?;
    let engine = context.engine(local.clone())?;
    if engine.backup(&user_id, identity_key).await {
        println!("Backup uploaded");
        Ok(())
    } else {
        Err(CliError::BackupFailed)
    }
}

pub fn resolve_db_path() -> Result<PathBuf, CliError> {
    if let Some(path) = env::var_os("PURSE_DB_PATH") {
        return Ok(PathBuf::from(path));
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("purse").join("purse.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub fn default_backup_dir() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("purse").join("backups"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub fn parse_amount(raw: &str) -> Result<f64, CliError> {
    let cleaned = raw.trim().replace(',', "");
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|amount| is_valid_amount(*amount))
        .ok_or_else(|| CliError::InvalidAmount(raw.trim().to_string()))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| CliError::InvalidDate(raw.trim().to_string()))
}

pub fn normalize_category(category: &str) -> Result<String, CliError> {
    normalize_text_option(Some(category.to_string())).ok_or(CliError::EmptyCategory)
}

pub fn normalize_identifier(id: &str) -> Result<String, CliError> {
    normalize_text_option(Some(id.to_string())).ok_or(CliError::EmptyId)
}

/// Find the single item whose id equals or starts with `query`.
pub fn resolve_by_prefix<'a, T>(
    items: &'a [T],
    query: &str,
    kind: &'static str,
    id_of: impl Fn(&T) -> String,
) -> Result<&'a T, CliError> {
    let query = normalize_identifier(query)?.to_ascii_lowercase();
    if let Some(exact) = items.iter().find(|item| id_of(item) == query) {
        return Ok(exact);
    }

    let matches: Vec<&T> = items
        .iter()
        .filter(|item| id_of(item).starts_with(&query))
        .collect();

    match matches.as_slice() {
        [] => Err(CliError::NotFound { kind, query }),
        [single] => Ok(*single),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|item| short_id(&id_of(item)))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

pub fn format_amount(amount: f64) -> String {
    format!("{amount:.2}")
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn format_expense_lines(expenses: &[Expense]) -> Vec<String> {
    expenses
        .iter()
        .map(|expense| {
            let id = short_id(&expense.id.to_string());
            let amount = format_amount(expense.amount);
            let line = format!(
                "{id:<13}  {}  {amount:>10}  {}",
                expense.date, expense.category
            );
            match &expense.description {
                Some(description) => format!("{line}  {description}"),
                None => line,
            }
        })
        .collect()
}

/// Category limit with what was spent against it this month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimitRow {
    pub category: String,
    pub limit: f64,
    pub spent: f64,
    pub remaining: f64,
}

pub fn limit_rows(
    limits: &BTreeMap<String, Budget>,
    expenses: &[Expense],
    today: NaiveDate,
) -> Vec<LimitRow> {
    limits
        .iter()
        .map(|(category, budget)| {
            let spent: f64 = expenses
                .iter()
                .filter(|expense| {
                    expense.category == *category
                        && expense.date.year() == today.year()
                        && expense.date.month() == today.month()
                })
                .map(|expense| expense.amount)
                .sum();
            LimitRow {
                category: category.clone(),
                limit: budget.amount,
                spent,
                remaining: budget.amount - spent,
            }
        })
        .collect()
}

pub fn format_limit_lines(rows: &[LimitRow]) -> Vec<String> {
    rows.iter()
        .map(|row| {
            let marker = if row.remaining < 0.0 { "  OVER" } else { "" };
            format!(
                "{:<20}  {:>10} / {:>10}  left {:>10}{marker}",
                row.category,
                format_amount(row.spent),
                format_amount(row.limit),
                format_amount(row.remaining)
            )
        })
        .collect()
}

pub fn format_goal_lines(goals: &[SavingsGoal]) -> Vec<String> {
    goals
        .iter()
        .map(|goal| {
            let id = short_id(&goal.id.to_string());
            let mut line = format!(
                "{id:<13}  {:<20}  {:>10} / {:>10}",
                goal.name,
                format_amount(goal.current_amount),
                format_amount(goal.target_amount)
            );
            if let Some(priority) = goal.priority {
                line.push_str(&format!("  {priority:?}").to_lowercase());
            }
            if let Some(date) = goal.target_date {
                line.push_str(&format!("  by {date}"));
            }
            if goal.is_reached() {
                line.push_str("  reached");
            }
            line
        })
        .collect()
}
