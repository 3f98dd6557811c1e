use purse_core::{EmergencyFund, LocalDataAccessor};

use crate::cli::TargetCommands;
use crate::commands::common::{backup_after_change, format_amount, parse_amount, CommandContext};
use crate::error::CliError;

pub async fn run_target(command: TargetCommands, context: &CommandContext) -> Result<(), CliError> {
    match command {
        TargetCommands::Set {
            amount,
            current,
            backup,
        } => run_target_set(&amount, current.as_deref(), backup, context).await,
        TargetCommands::Show { json } => run_target_show(json, context).await,
    }
}

/// New fund value; the saved amount carries over unless given.
pub fn updated_fund(
    existing: Option<&EmergencyFund>,
    target_amount: f64,
    current_amount: Option<f64>,
) -> EmergencyFund {
    let current_amount = current_amount
        .or_else(|| existing.map(|fund| fund.current_amount))
        .unwrap_or(0.0);
    EmergencyFund::new(target_amount, current_amount)
}

pub async fn run_target_set(
    amount: &str,
    current: Option<&str>,
    backup: bool,
    context: &CommandContext,
) -> Result<(), CliError> {
    let target_amount = parse_amount(amount)?;
    let current_amount = current.map(parse_amount).transpose()?;

    let local = context.open_local().await?;
    let existing = local.savings_target().await?;
    let fund = updated_fund(existing.as_ref(), target_amount, current_amount);
    local.set_savings_target(&fund).await?;
    println!("{}", format_fund(&fund));

    backup_after_change(backup, context, &local).await
}

pub fn format_fund(fund: &EmergencyFund) -> String {
    format!(
        "Emergency fund: {} / {} ({:.0}%)",
        format_amount(fund.current_amount),
        format_amount(fund.target_amount),
        fund.progress() * 100.0
    )
}

pub async fn run_target_show(as_json: bool, context: &CommandContext) -> Result<(), CliError> {
    let local = context.open_local().await?;
    let fund = local.savings_target().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&fund)?);
        return Ok(());
    }
    match fund {
        Some(fund) => println!("{}", format_fund(&fund)),
        None => println!("No emergency fund target set."),
    }
    Ok(())
}
