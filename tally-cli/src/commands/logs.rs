//! Logs command - rule activity recorded in logs.duckdb

use std::collections::HashMap;

use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;
use uuid::Uuid;

use super::get_tally_dir;
use crate::output::{self, create_table};
use tally_core::services::{EntryPoint, LogEntry, LogFilter, LoggingService};

/// Events the rule and categorization services emit, with a display label
const RULE_EVENTS: &[(&str, &str)] = &[
    ("rule_created", "Created"),
    ("rule_updated", "Updated"),
    ("rule_deleted", "Deleted"),
    ("rule_moved", "Moved"),
    ("rules_reordered", "Reordered"),
    ("rules_applied", "Applied"),
    ("rules_applied_dry_run", "Dry runs"),
];

const FAILED_SUFFIX: &str = "_failed";

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent rule activity
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Show only failed operations
        #[arg(long)]
        errors: bool,
        /// Only entries about this rule
        #[arg(long)]
        rule: Option<Uuid>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete old entries
    Clear {
        /// Delete entries older than N days
        #[arg(long, default_value = "30")]
        older_than_days: u32,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Count rule operations and failures
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn open_logs() -> Result<LoggingService> {
    let tally_dir = get_tally_dir()?;
    std::fs::create_dir_all(&tally_dir)?;
    LoggingService::new(&tally_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
}

fn format_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

pub fn run(command: LogsCommands) -> Result<()> {
    let logs = open_logs()?;
    match command {
        LogsCommands::List {
            limit,
            errors,
            rule,
            json,
        } => {
            let filter = LogFilter {
                errors_only: errors,
                rule_id: rule.map(|id| id.to_string()),
            };
            let entries = logs.list(&filter, limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print_entries(&entries, rule.is_none());
            }
        }
        LogsCommands::Clear {
            older_than_days,
            force,
            json,
        } => {
            if !force && !json {
                let prompt = format!("Delete log entries older than {} days?", older_than_days);
                if !Confirm::new().with_prompt(prompt).default(false).interact()? {
                    println!("{}", "Cancelled".dimmed());
                    return Ok(());
                }
            }

            let cutoff = Utc::now() - Duration::days(i64::from(older_than_days));
            let deleted = logs.delete_before(cutoff.timestamp_millis())?;
            if json {
                println!("{}", serde_json::json!({ "deleted": deleted }));
            } else {
                output::success(&format!("Deleted {} log entries", deleted));
            }
        }
        LogsCommands::Stats { json } => {
            let counts: HashMap<String, u64> = logs.event_counts()?.into_iter().collect();
            let count_of = |event: &str| counts.get(event).copied().unwrap_or(0);

            let activity: Vec<(&str, u64, u64)> = RULE_EVENTS
                .iter()
                .map(|(event, label)| {
                    let failed = format!("{}{}", event, FAILED_SUFFIX);
                    (*label, count_of(event), count_of(&failed))
                })
                .collect();
            let failures: u64 = counts
                .iter()
                .filter(|(event, _)| event.ends_with(FAILED_SUFFIX))
                .map(|(_, n)| n)
                .sum();
            let commands = count_of("command_executed");

            if json {
                let by_event: serde_json::Map<String, serde_json::Value> = RULE_EVENTS
                    .iter()
                    .zip(&activity)
                    .map(|((event, _), (_, ok, failed))| {
                        (
                            event.to_string(),
                            serde_json::json!({ "ok": ok, "failed": failed }),
                        )
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "commands": commands,
                        "failures": failures,
                        "events": by_event,
                        "database_path": logs.db_path().to_string_lossy(),
                    }))?
                );
                return Ok(());
            }

            let mut table = create_table();
            table.set_header(vec!["Operation", "OK", "Failed"]);
            for (label, ok, failed) in &activity {
                let failed = if *failed > 0 {
                    failed.to_string().red().to_string()
                } else {
                    failed.to_string()
                };
                table.add_row(vec![label.to_string(), ok.to_string(), failed]);
            }
            println!("{}", table);
            println!("  Commands run: {}", commands);
            println!("  Failures:     {}", failures);
            println!("  {}", logs.db_path().display().to_string().dimmed());
        }
    }

    Ok(())
}

fn print_entries(entries: &[LogEntry], show_rule: bool) {
    if entries.is_empty() {
        output::info("No log entries found.");
        return;
    }

    let mut table = create_table();
    let mut header = vec!["Time", "Event"];
    if show_rule {
        header.push("Rule");
    }
    header.extend(["Command", "Error"]);
    table.set_header(header);

    for entry in entries {
        let event = if entry.event.ends_with(FAILED_SUFFIX) {
            entry.event.red().to_string()
        } else {
            entry.event.clone()
        };
        let mut row = vec![format_timestamp(entry.timestamp), event];
        if show_rule {
            row.push(entry.rule_id.clone().unwrap_or_default());
        }
        row.push(entry.command.clone().unwrap_or_default());
        row.push(entry.error_message.clone().unwrap_or_default());
        table.add_row(row);
    }

    println!("{}", table);
}
