use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "purse")]
#[command(about = "Track spending, limits and savings with automatic cloud backup")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Identity key used to seal backups (defaults to PURSE_IDENTITY_KEY)
    #[arg(long, global = true, value_name = "KEY")]
    pub identity_key: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record and review expenses
    Expense {
        #[command(subcommand)]
        command: ExpenseCommands,
    },
    /// Manage monthly category limits
    Limit {
        #[command(subcommand)]
        command: LimitCommands,
    },
    /// Manage the emergency fund target
    Target {
        #[command(subcommand)]
        command: TargetCommands,
    },
    /// Manage savings goals
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },
    /// Back up and restore the local dataset
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Record a new expense
    #[command(alias = "new")]
    Add {
        /// Amount spent
        amount: String,
        /// Spending category
        category: String,
        /// Optional description
        #[arg(short, long)]
        description: Option<String>,
        /// Date of the expense (YYYY-MM-DD, defaults to today)
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
        /// Upload a backup after recording
        #[arg(long)]
        backup: bool,
    },
    /// List recent expenses
    List {
        /// Number of expenses to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Only show this category
        #[arg(long)]
        category: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an expense
    Delete {
        /// Expense ID or unique ID prefix
        id: String,
        /// Upload a backup after deleting
        #[arg(long)]
        backup: bool,
    },
}

#[derive(Subcommand)]
pub enum LimitCommands {
    /// Set the limit for a category
    Set {
        category: String,
        amount: String,
        /// Upload a backup after the change
        #[arg(long)]
        backup: bool,
    },
    /// Remove the limit for a category
    Delete {
        category: String,
        /// Upload a backup after the change
        #[arg(long)]
        backup: bool,
    },
    /// Show limits with spending per category
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum TargetCommands {
    /// Set the emergency fund target
    Set {
        /// Target amount
        amount: String,
        /// Amount saved so far (keeps the current value when omitted)
        #[arg(long, value_name = "AMOUNT")]
        current: Option<String>,
        /// Upload a backup after the change
        #[arg(long)]
        backup: bool,
    },
    /// Show the emergency fund target and progress
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum GoalCommands {
    /// Create a savings goal
    Add {
        name: String,
        /// Target amount
        target: String,
        /// Target date (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
        /// Optional category
        #[arg(long)]
        category: Option<String>,
        /// Priority
        #[arg(long, value_enum)]
        priority: Option<PriorityArg>,
        /// Upload a backup after the change
        #[arg(long)]
        backup: bool,
    },
    /// List savings goals
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add money to a savings goal
    Contribute {
        /// Goal ID or unique ID prefix
        id: String,
        amount: String,
        /// Upload a backup after the change
        #[arg(long)]
        backup: bool,
    },
    /// Delete a savings goal
    Delete {
        /// Goal ID or unique ID prefix
        id: String,
        /// Upload a backup after the change
        #[arg(long)]
        backup: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum PriorityArg {
    Low,
    Medium,
    High,
}

#[derive(Subcommand)]
pub enum BackupCommands {
    /// Upload a backup of the local dataset now
    Now,
    /// Restore category limits and the emergency fund from the backup
    Restore {
        /// Give up after this many seconds (defaults to the profile setting or 30)
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
    /// Show details of the stored backup
    Info {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show whether a backup exists and what is stored locally
    Status,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum RemoteKindArg {
    File,
    Http,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ProtectionArg {
    Sealed,
    Plaintext,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// User id backups are stored under
        #[arg(long, value_name = "ID")]
        user_id: Option<String>,
        /// Local database path for this profile
        #[arg(long, value_name = "PATH")]
        database: Option<String>,
        /// Remote store kind
        #[arg(long, value_enum)]
        remote_kind: Option<RemoteKindArg>,
        /// Backup directory (file) or base URL (http)
        #[arg(long, value_name = "LOCATION")]
        remote: Option<String>,
        /// Payload protection for new backups
        #[arg(long, value_enum)]
        protection: Option<ProtectionArg>,
        /// Restore timeout in seconds
        #[arg(long, value_name = "SECS")]
        restore_timeout: Option<u64>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved profile
    Show,
}
