use purse_core::models::GoalPriority;
use purse_core::{LocalDataAccessor, SavingsGoal};

use crate::cli::{GoalCommands, PriorityArg};
use crate::commands::common::{
    backup_after_change, format_amount, format_goal_lines, parse_amount, parse_date,
    resolve_by_prefix, CommandContext,
};
use crate::config_profiles::normalize_text_option;
use crate::error::CliError;

impl From<PriorityArg> for GoalPriority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::Low => Self::Low,
            PriorityArg::Medium => Self::Medium,
            PriorityArg::High => Self::High,
        }
    }
}

pub async fn run_goal(command: GoalCommands, context: &CommandContext) -> Result<(), CliError> {
    match command {
        GoalCommands::Add {
            name,
            target,
            date,
            category,
            priority,
            backup,
        } => {
            let goal = build_goal(&name, &target, date.as_deref(), category, priority)?;
            run_goal_add(goal, backup, context).await
        }
        GoalCommands::List { json } => run_goal_list(json, context).await,
        GoalCommands::Contribute { id, amount, backup } => {
            run_goal_contribute(&id, &amount, backup, context).await
        }
        GoalCommands::Delete { id, backup } => run_goal_delete(&id, backup, context).await,
    }
}

pub fn build_goal(
    name: &str,
    target: &str,
    date: Option<&str>,
    category: Option<String>,
    priority: Option<PriorityArg>,
) -> Result<SavingsGoal, CliError> {
    if name.trim().is_empty() {
        return Err(CliError::EmptyName);
    }
    let mut goal = SavingsGoal::new(name, parse_amount(target)?);
    goal.target_date = date.map(parse_date).transpose()?;
    goal.category = normalize_text_option(category);
    goal.priority = priority.map(GoalPriority::from);
    Ok(goal)
}

pub async fn run_goal_add(
    goal: SavingsGoal,
    backup: bool,
    context: &CommandContext,
) -> Result<(), CliError> {
    let local = context.open_local().await?;
    local.add_savings_goal(&goal).await?;
    println!("{}", goal.id);

    backup_after_change(backup, context, &local).await
}

pub async fn run_goal_list(as_json: bool, context: &CommandContext) -> Result<(), CliError> {
    let local = context.open_local().await?;
    let goals = local.savings_goals().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&goals)?);
    } else if goals.is_empty() {
        println!("No savings goals.");
    } else {
        for line in format_goal_lines(&goals) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_goal_contribute(
    id: &str,
    amount: &str,
    backup: bool,
    context: &CommandContext,
) -> Result<(), CliError> {
    let amount = parse_amount(amount)?;

    let local = context.open_local().await?;
    let goals = local.savings_goals().await?;
    let mut goal = resolve_by_prefix(&goals, id, "savings goal", |g| g.id.to_string())?.clone();
    goal.contribute(amount);
    local.update_savings_goal(&goal).await?;

    println!(
        "{}: {} / {}",
        goal.name,
        format_amount(goal.current_amount),
        format_amount(goal.target_amount)
    );
    if goal.is_reached() {
        println!("Goal reached!");
    }

    backup_after_change(backup, context, &local).await
}

pub async fn run_goal_delete(
    id: &str,
    backup: bool,
    context: &CommandContext,
) -> Result<(), CliError> {
    let local = context.open_local().await?;
    let goals = local.savings_goals().await?;
    let goal = resolve_by_prefix(&goals, id, "savings goal", |g| g.id.to_string())?;

    local.delete_savings_goal(&goal.id).await?;
    println!("{}", goal.id);

    backup_after_change(backup, context, &local).await
}
