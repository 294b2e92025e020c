//! Tally CLI - categorize transactions with your own rules

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{apply, config, demo, logs, preview, rules};

/// Tally - rule-based transaction categorization
#[derive(Parser)]
#[command(name = "tally", version, about, long_about = None)]
struct Cli {
    /// User whose rules and transactions to use
    #[arg(long, short, global = true, env = "TALLY_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage categorization rules
    Rules {
        #[command(subcommand)]
        command: rules::RulesCommands,
    },

    /// Apply active rules to transactions
    Apply {
        /// Also overwrite categories that are already set
        #[arg(long)]
        force: bool,
        /// Show what would change without saving
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which rule would categorize each transaction
    Preview {
        /// Only show transactions no rule matches
        #[arg(long)]
        unmatched: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Seed demo transactions (and optionally starter rules)
    Demo {
        /// Days of history to generate
        #[arg(long, default_value = "90")]
        days: u32,
        /// Also create a starter rule set
        #[arg(long)]
        with_rules: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage application logs
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(cli).await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let user = cli.user.as_deref();
    match cli.command {
        Commands::Rules { command } => rules::run(user, command).await,
        Commands::Apply { force, dry_run, json } => apply::run(user, force, dry_run, json).await,
        Commands::Preview { unmatched, json } => preview::run(user, unmatched, json).await,
        Commands::Demo { days, with_rules, json } => demo::run(user, days, with_rules, json).await,
        Commands::Logs { command } => logs::run(command),
        Commands::Config { command } => config::run(command),
    }
}
