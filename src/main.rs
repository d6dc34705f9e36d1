use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use ratesync::AppCommand;
use ratesync::core::Target;
use ratesync::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Capture the current rate table into the local store
    Scrape,
    /// Push a single source day to one system
    Push {
        /// ledger or midrange
        target: Target,
        /// Source day as days before today (0 = today)
        #[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(i64).range(0..=365))]
        days_back: i64,
        /// Push even if the system already has rates for the day
        #[arg(long)]
        force: bool,
    },
    /// Push every missing day of the look-back window to one system
    Backfill {
        /// ledger or midrange
        target: Target,
        #[arg(short, long, default_value_t = 7, value_parser = clap::value_parser!(i64).range(0..=365))]
        days_back: i64,
    },
    /// Backfill both systems
    BackfillBoth {
        #[arg(short, long, default_value_t = 7, value_parser = clap::value_parser!(i64).range(0..=365))]
        days_back: i64,
    },
    /// Show whether a system has rates for the next business day
    Status {
        /// ledger or midrange
        target: Target,
    },
    /// List stored snapshots of one source day
    Rates {
        #[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(i64).range(0..=365))]
        days_back: i64,
        /// List every stored snapshot instead
        #[arg(long, conflicts_with = "days_back")]
        all: bool,
    },
    /// Run one reconciliation: scrape if today is missing, otherwise push
    Reconcile,
    /// Alert if a system has no rates for the next business day
    Alert {
        /// ledger or midrange
        #[arg(default_value = "ledger")]
        target: Target,
    },
    /// Send a test notice through the configured notifier
    TestNotice,
    /// Run the reconciliation and alert on the configured schedule
    Watch,
}

impl From<Commands> for AppCommand {
    fn from(cmd: Commands) -> AppCommand {
        match cmd {
            Commands::Scrape => AppCommand::Scrape,
            Commands::Push {
                target,
                days_back,
                force,
            } => AppCommand::Push {
                target,
                days_back,
                force,
            },
            Commands::Backfill { target, days_back } => AppCommand::Backfill { target, days_back },
            Commands::BackfillBoth { days_back } => AppCommand::BackfillBoth { days_back },
            Commands::Status { target } => AppCommand::Status { target },
            Commands::Rates { days_back, all } => AppCommand::Rates {
                days_back: (!all).then_some(days_back),
            },
            Commands::Reconcile => AppCommand::Reconcile,
            Commands::Alert { target } => AppCommand::Alert { target },
            Commands::TestNotice => AppCommand::TestNotice,
            Commands::Watch => AppCommand::Watch,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => ratesync::cli::setup::setup_at_path(path),
            None => ratesync::cli::setup::setup(),
        },
        Some(cmd) => ratesync::run_command(cmd.into(), cli.config_path.as_deref(), cli.json).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
