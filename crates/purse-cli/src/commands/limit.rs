use chrono::Local;
use purse_core::{Budget, LocalDataAccessor};

use crate::cli::LimitCommands;
use crate::commands::common::{
    backup_after_change, format_amount, format_limit_lines, limit_rows, normalize_category,
    parse_amount, CommandContext,
};
use crate::error::CliError;

pub async fn run_limit(command: LimitCommands, context: &CommandContext) -> Result<(), CliError> {
    match command {
        LimitCommands::Set {
            category,
            amount,
            backup,
        } => run_limit_set(&category, &amount, backup, context).await,
        LimitCommands::Delete { category, backup } => {
            run_limit_delete(&category, backup, context).await
        }
        LimitCommands::List { json } => run_limit_list(json, context).await,
    }
}

pub async fn run_limit_set(
    category: &str,
    amount: &str,
    backup: bool,
    context: &CommandContext,
) -> Result<(), CliError> {
    let category = normalize_category(category)?;
    let budget = Budget::new(parse_amount(amount)?);

    let local = context.open_local().await?;
    local.set_category_limit(&category, &budget).await?;
    println!("{category}: {}", format_amount(budget.amount));

    backup_after_change(backup, context, &local).await
}

pub async fn run_limit_delete(
    category: &str,
    backup: bool,
    context: &CommandContext,
) -> Result<(), CliError> {
    let category = normalize_category(category)?;

    let local = context.open_local().await?;
    local.delete_category_limit(&category).await?;
    println!("Removed limit for {category}");

    backup_after_change(backup, context, &local).await
}

pub async fn run_limit_list(as_json: bool, context: &CommandContext) -> Result<(), CliError> {
    let local = context.open_local().await?;
    let limits = local.category_limits().await?;
    let expenses = local.ledger_entries().await?;
    let rows = limit_rows(&limits, &expenses, Local::now().date_naive());

    if as_json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if rows.is_empty() {
        println!("No category limits set.");
    } else {
        for line in format_limit_lines(&rows) {
            println!("{line}");
        }
    }
    Ok(())
}
