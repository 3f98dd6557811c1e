use purse_core::{Expense, LocalDataAccessor};

use crate::cli::ExpenseCommands;
use crate::commands::common::{
    backup_after_change, format_expense_lines, normalize_category, parse_amount, parse_date,
    resolve_by_prefix, CommandContext,
};
use crate::error::CliError;

pub async fn run_expense(command: ExpenseCommands, context: &CommandContext) -> Result<(), CliError> {
    match command {
        ExpenseCommands::Add {
            amount,
            category,
            description,
            date,
            backup,
        } => {
            run_expense_add(
                &amount,
                &category,
                description,
                date.as_deref(),
                backup,
                context,
            )
            .await
        }
        ExpenseCommands::List {
            limit,
            category,
            json,
        } => run_expense_list(limit, category.as_deref(), json, context).await,
        ExpenseCommands::Delete { id, backup } => run_expense_delete(&id, backup, context).await,
    }
}

pub fn build_expense(
    amount: &str,
    category: &str,
    description: Option<String>,
    date: Option<&str>,
) -> Result<Expense, CliError> {
    let mut expense = Expense::new(parse_amount(amount)?, normalize_category(category)?);
    if let Some(description) = description {
        expense = expense.with_description(description);
    }
    if let Some(date) = date {
        expense = expense.with_date(parse_date(date)?);
    }
    Ok(expense)
}

pub async fn run_expense_add(
    amount: &str,
    category: &str,
    description: Option<String>,
    date: Option<&str>,
    backup: bool,
    context: &CommandContext,
) -> Result<(), CliError> {
    let expense = build_expense(amount, category, description, date)?;

    let local = context.open_local().await?;
    local.add_ledger_entry(&expense).await?;
    println!("{}", expense.id);

    backup_after_change(backup, context, &local).await
}

/// Most recent expenses first, optionally for a single category
pub fn select_expenses(
    mut expenses: Vec<Expense>,
    limit: usize,
    category: Option<&str>,
) -> Vec<Expense> {
    if let Some(category) = category.map(str::trim).filter(|c| !c.is_empty()) {
        expenses.retain(|expense| expense.category.eq_ignore_ascii_case(category));
    }
    expenses.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    expenses.truncate(limit);
    expenses
}

pub async fn run_expense_list(
    limit: usize,
    category: Option<&str>,
    as_json: bool,
    context: &CommandContext,
) -> Result<(), CliError> {
    let local = context.open_local().await?;
    let expenses = select_expenses(local.ledger_entries().await?, limit, category);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&expenses)?);
    } else if expenses.is_empty() {
        println!("No expenses recorded.");
    } else {
        for line in format_expense_lines(&expenses) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_expense_delete(
    id: &str,
    backup: bool,
    context: &CommandContext,
) -> Result<(), CliError> {
    let local = context.open_local().await?;
    let expenses = local.ledger_entries().await?;
    let expense = resolve_by_prefix(&expenses, id, "expense", |e| e.id.to_string())?;

    local.delete_ledger_entry(&expense.id).await?;
    println!("{}", expense.id);

    backup_after_change(backup, context, &local).await
}
