//! Purse CLI - personal finance tracking from the command line
//!
//! Records expenses, category limits, an emergency fund and savings goals in
//! a local database, and backs them up to a remote document store.

mod cli;
mod commands;
mod config_profiles;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::backup::run_backup;
use crate::commands::common::CommandContext;
use crate::commands::config::run_config;
use crate::commands::expense::run_expense;
use crate::commands::goal::run_goal;
use crate::commands::limit::run_limit;
use crate::commands::target::run_target;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("purse=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Cli {
        command,
        db_path,
        profile,
        identity_key,
    } = Cli::parse();
    let global_profile = profile.clone();
    let resolve_context =
        move || CommandContext::resolve(db_path, profile.as_deref(), identity_key);

    match command {
        Commands::Config { command } => {
            run_config(command, global_profile.as_deref(), resolve_context)
        }
        Commands::Expense { command } => run_expense(command, &resolve_context()?).await,
        Commands::Limit { command } => run_limit(command, &resolve_context()?).await,
        Commands::Target { command } => run_target(command, &resolve_context()?).await,
        Commands::Goal { command } => run_goal(command, &resolve_context()?).await,
        Commands::Backup { command } => run_backup(command, &resolve_context()?).await,
    }
}
