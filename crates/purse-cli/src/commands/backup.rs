use std::time::Duration;

use purse_core::backup::{BackupError, DigestCheck, RestoreOutcome, RestoreReport};
use purse_core::LocalDataAccessor;

use crate::cli::BackupCommands;
use crate::commands::common::{format_timestamp, CommandContext};
use crate::error::CliError;

pub async fn run_backup(command: BackupCommands, context: &CommandContext) -> Result<(), CliError> {
    match command {
        BackupCommands::Now => run_backup_now(context).await,
        BackupCommands::Restore { timeout } => {
            run_backup_restore(timeout.map(Duration::from_secs), context).await
        }
        BackupCommands::Info { json } => run_backup_info(json, context).await,
        BackupCommands::Status => run_backup_status(context).await,
    }
}

pub async fn run_backup_now(context: &CommandContext) -> Result<(), CliError> {
    let user_id = context.user_id()?;
    let identity_key = context.identity_key()?;
    let engine = context.engine(context.open_local().await?)?;

    match engine.try_backup(&user_id, identity_key).await {
        Ok(outcome) => {
            println!(
                "Backed up {} expenses, {} category limits and {} savings goals",
                outcome.counts.ledger_entries,
                outcome.counts.category_limits,
                outcome.counts.savings_goals
            );
            if outcome.degraded {
                println!("Warning: some local data could not be read and was left out");
            }
            Ok(())
        }
        Err(error) => {
            tracing::error!("Backup failed for user {user_id}: {error}");
            Err(CliError::BackupFailed)
        }
    }
}

pub async fn run_backup_restore(
    timeout: Option<Duration>,
    context: &CommandContext,
) -> Result<(), CliError> {
    let user_id = context.user_id()?;
    let identity_key = context.identity_key()?;
    let engine = context.engine(context.open_local().await?)?;
    let timeout = timeout.unwrap_or(engine.config().restore_timeout);

    match engine
        .try_restore_with_timeout(&user_id, identity_key, timeout)
        .await
    {
        Ok(RestoreOutcome::Restored(report)) => {
            for line in format_restore_report(&report) {
                println!("{line}");
            }
            Ok(())
        }
        Ok(RestoreOutcome::NoBackupFound) => {
            println!("No backup found for user {user_id}");
            Ok(())
        }
        Err(BackupError::TimedOut(elapsed)) => {
            tracing::error!("Restore for user {user_id} timed out after {elapsed:?}");
            Err(CliError::RestoreFailed)
        }
        Err(error) => {
            tracing::error!("Restore failed for user {user_id}: {error}");
            Err(CliError::RestoreFailed)
        }
    }
}

pub fn format_restore_report(report: &RestoreReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Restored backup from {}",
        format_timestamp(report.snapshot_time)
    )];
    lines.push(format!(
        "Category limits restored: {}",
        report.limits_applied.len()
    ));
    if report.savings_target_applied {
        lines.push("Emergency fund target restored".to_string());
    }
    if !report.limits_skipped.is_empty() {
        lines.push(format!(
            "Skipped invalid limits: {}",
            report.limits_skipped.join(", ")
        ));
    }
    if report.savings_target_skipped {
        lines.push("Skipped invalid emergency fund target".to_string());
    }
    if let DigestCheck::Mismatch { .. } = report.digest_check {
        lines.push("Warning: backup failed its integrity check; restored anyway".to_string());
    }
    for failure in &report.write_failures {
        lines.push(format!("Failed to write {failure}"));
    }
    lines.push(format!(
        "Expenses and savings goals were kept as they are on this device ({} expenses, {} goals in backup)",
        report.counts.ledger_entries, report.counts.savings_goals
    ));
    lines
}

pub async fn run_backup_info(as_json: bool, context: &CommandContext) -> Result<(), CliError> {
    let user_id = context.user_id()?;
    let engine = context.engine(context.open_local().await?)?;

    let Some(info) = engine.get_backup_info(&user_id).await else {
        println!("No backup found for user {user_id}");
        return Ok(());
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Last updated:    {}", format_timestamp(info.last_updated));
    println!("Schema version:  {}", info.schema_version);
    println!(
        "Device:          {} ({}, v{})",
        info.device_info.device_id, info.device_info.platform, info.device_info.app_version
    );
    println!("Sealed:          {}", if info.sealed { "yes" } else { "no" });
    println!("Expenses:        {}", info.counts.ledger_entries);
    println!("Category limits: {}", info.counts.category_limits);
    println!("Savings goals:   {}", info.counts.savings_goals);
    println!(
        "Emergency fund:  {}",
        if info.counts.has_savings_target {
            "set"
        } else {
            "not set"
        }
    );
    Ok(())
}

pub async fn run_backup_status(context: &CommandContext) -> Result<(), CliError> {
    let user_id = context.user_id()?;
    let local = context.open_local().await?;
    let expenses = local.ledger_entries().await?.len();
    let limits = local.category_limits().await?.len();
    let goals = local.savings_goals().await?.len();
    let engine = context.engine(local)?;

    println!("Profile:  {}", context.profile_name);
    println!("User:     {user_id}");
    println!("Database: {}", context.db_path.display());
    println!("Local:    {expenses} expenses, {limits} category limits, {goals} savings goals");
    if engine.has_backup(&user_id).await {
        println!("Backup:   present (run `purse backup info` for details)");
    } else {
        println!("Backup:   none");
    }
    Ok(())
}
