use clap::{Args, Parser, Subcommand};
use tracing_subscriber::filter::LevelFilter;

#[derive(Debug, Parser)]
#[command(name = "buddy")]
#[command(about = "Local-first savings ledger with tiers and achievements", long_about = None)]
pub struct Cli {
    /// Override Buddy home directory (config/data subdirs will be created inside it).
    #[arg(long, env = "BUDDY_HOME")]
    pub home: Option<std::path::PathBuf>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, env = "BUDDY_LOG", default_value = "warn")]
    pub log_level: LevelFilter,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(flatten)]
    Ledger(LedgerCmd),
    Profile(ProfileArgs),
}

/// Commands that work on the current profile's ledger.
#[derive(Debug, Subcommand)]
pub enum LedgerCmd {
    /// Record a savings entry of any type.
    Add(AddArgs),
    /// Record a deposit.
    Deposit(EntryArgs),
    /// Record a withdrawal.
    Withdraw(EntryArgs),

    Entries(EntriesArgs),
    Tier,
    Stats,
    Achievements,
    /// Re-evaluate the current balance and award anything not yet awarded.
    Check,

    Theme(ThemeArgs),
}

#[derive(Debug, Args, Clone)]
pub struct EntryArgs {
    #[arg(allow_negative_numbers = true)]
    pub amount: String,

    #[arg(long, short = 'l')]
    pub label: Option<String>,

    #[arg(long, short = 'p')]
    pub purpose: Option<String>,

    /// Entry date (RFC3339). Defaults to now.
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    #[command(flatten)]
    pub entry: EntryArgs,

    /// deposit, withdrawal, adjustment or transfer.
    #[arg(long = "type", short = 't', default_value = "deposit")]
    pub entry_type: String,
}

#[derive(Debug, Args)]
pub struct EntriesArgs {
    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long)]
    pub offset: Option<usize>,
}

#[derive(Debug, Subcommand)]
pub enum ThemeCmd {
    List,
    Activate { theme_id: String },
}

#[derive(Debug, Args)]
pub struct ThemeArgs {
    #[command(subcommand)]
    pub cmd: ThemeCmd,
}

#[derive(Debug, Subcommand)]
pub enum ProfileCmd {
    Check,
    Add { name: String },
    Checkout { name: String },
    List,
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub cmd: ProfileCmd,
}
