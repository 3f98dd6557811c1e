use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] purse_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid amount '{0}': expected a non-negative number")]
    InvalidAmount(String),
    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("Category cannot be empty")]
    EmptyCategory,
    #[error("Name cannot be empty")]
    EmptyName,
    #[error("ID cannot be empty")]
    EmptyId,
    #[error("No {kind} found for id/prefix: {query}")]
    NotFound { kind: &'static str, query: String },
    #[error("{0}")]
    AmbiguousId(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("No user id configured. Run `purse config init --user-id <ID>`.")]
    MissingUserId,
    #[error(
        "An identity key is required for sealed backups. Pass --identity-key or set PURSE_IDENTITY_KEY."
    )]
    MissingIdentityKey,
    #[error("Backup failed. See the log output for details.")]
    BackupFailed,
    #[error("Restore failed. See the log output for details.")]
    RestoreFailed,
}
