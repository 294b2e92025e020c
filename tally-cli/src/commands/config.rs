//! Config command - default user and event logging

use anyhow::Result;
use clap::{Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::json;

use super::get_tally_dir;
use crate::output;
use tally_core::config::{Config, USER_ENV};

#[derive(Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Use this user when --user and TALLY_USER are not given
    SetUser {
        /// User ID
        user: String,
    },
    /// Forget the default user
    ClearUser,
    /// Turn event logging to logs.duckdb on or off
    Logging {
        #[arg(value_enum)]
        state: Toggle,
    },
}

pub fn run(command: ConfigCommands) -> Result<()> {
    let tally_dir = get_tally_dir()?;
    let mut config = Config::load(&tally_dir).unwrap_or_default();

    match command {
        ConfigCommands::Show { json } => {
            let active = config.resolve_user(None);
            if json {
                let settings = json!({
                    "default_user": config.default_user,
                    "active_user": active,
                    "logging": config.logging_enabled,
                    "data_dir": tally_dir.to_string_lossy(),
                });
                println!("{}", serde_json::to_string_pretty(&settings)?);
                return Ok(());
            }

            println!("{}", "Settings".bold());
            println!(
                "  Default user: {}",
                config.default_user.as_deref().unwrap_or("(not set)")
            );
            println!("  Active user:  {}", active);
            if std::env::var(USER_ENV).is_ok() {
                println!("  {}", format!("({} is set)", USER_ENV).dimmed());
            }
            println!(
                "  Logging:      {}",
                if config.logging_enabled { "on" } else { "off" }
            );
            println!("  Data dir:     {}", tally_dir.display());
        }
        ConfigCommands::SetUser { user } => {
            let user = user.trim();
            if user.is_empty() {
                anyhow::bail!("User ID cannot be empty");
            }
            config.default_user = Some(user.to_string());
            config.save(&tally_dir)?;
            output::success(&format!("Default user set to {}", user));
        }
        ConfigCommands::ClearUser => {
            config.default_user = None;
            config.save(&tally_dir)?;
            output::success("Default user cleared");
        }
        ConfigCommands::Logging { state } => {
            config.logging_enabled = matches!(state, Toggle::On);
            config.save(&tally_dir)?;
            let label = if config.logging_enabled { "on" } else { "off" };
            output::success(&format!("Event logging turned {}", label));
        }
    }

    Ok(())
}
