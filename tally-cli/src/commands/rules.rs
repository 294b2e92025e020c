//! Rules command - manage categorization rules

use std::io::{self, Read};

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;
use uuid::Uuid;

use super::get_context;
use crate::output::{self, create_table, print_json, truncate};
use tally_core::services::test_patterns;
use tally_core::{NewRule, Rule, RuleUpdate};

#[derive(Subcommand)]
pub enum RulesCommands {
    /// List rules in priority order
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a single rule
    Show {
        /// Rule ID
        id: Uuid,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a rule at the lowest priority
    Add {
        /// Pattern to look for (repeat for up to 5)
        #[arg(short, long = "pattern", required = true)]
        patterns: Vec<String>,
        /// Category to assign
        #[arg(short, long)]
        category: String,
        /// Note shown alongside the rule
        #[arg(long)]
        description: Option<String>,
        /// Create the rule disabled
        #[arg(long)]
        inactive: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change a rule's patterns, category, note or active flag
    Update {
        /// Rule ID
        id: Uuid,
        /// Replacement patterns (repeat for up to 5)
        #[arg(short, long = "pattern")]
        patterns: Vec<String>,
        /// New category
        #[arg(short, long)]
        category: Option<String>,
        /// New note
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        /// Remove the note
        #[arg(long)]
        clear_description: bool,
        /// Enable or disable the rule
        #[arg(long)]
        active: Option<bool>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a rule
    Remove {
        /// Rule ID
        id: Uuid,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the full rule order (highest priority first)
    Reorder {
        /// Every rule ID, in the new order (read from stdin if omitted)
        ids: Vec<Uuid>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move a rule one place up
    Up {
        /// Rule ID
        id: Uuid,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move a rule one place down
    Down {
        /// Rule ID
        id: Uuid,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check whether patterns would match a piece of text
    Test {
        /// Text to test against, e.g. a merchant name
        text: String,
        /// Pattern to try (repeat for several)
        #[arg(short, long = "pattern", required = true)]
        patterns: Vec<String>,
    },
}

pub async fn run(user: Option<&str>, command: RulesCommands) -> Result<()> {
    let (ctx, user_id) = get_context("rules", user)?;
    let rules = &ctx.rule_service;

    match command {
        RulesCommands::List { json } => {
            let result = rules.list_rules(&user_id).await;
            if json {
                return print_json(result);
            }
            print_rules(&result?);
        }
        RulesCommands::Show { id, json } => {
            let result = rules.get_rule(&user_id, id).await;
            if json {
                return print_json(result);
            }
            print_rule_detail(&result?);
        }
        RulesCommands::Add {
            patterns,
            category,
            description,
            inactive,
            json,
        } => {
            let input = NewRule {
                patterns,
                category_id: category,
                user_description: description,
                is_active: !inactive,
            };
            let result = rules.create_rule(&user_id, input).await;
            if json {
                return print_json(result);
            }
            let rule = result?;
            output::success(&format!("Created rule {} at priority {}", rule.id, rule.priority));
        }
        RulesCommands::Update {
            id,
            patterns,
            category,
            description,
            clear_description,
            active,
            json,
        } => {
            let user_description = if clear_description {
                Some(None)
            } else {
                description.map(Some)
            };
            let update = RuleUpdate {
                patterns: (!patterns.is_empty()).then_some(patterns),
                category_id: category,
                user_description,
                is_active: active,
            };
            if update.is_empty() && !json {
                output::warning("Nothing to update");
                return Ok(());
            }
            let result = rules.update_rule(&user_id, id, update).await;
            if json {
                return print_json(result);
            }
            let rule = result?;
            output::success(&format!("Updated rule {}", rule.id));
            print_rule_detail(&rule);
        }
        RulesCommands::Remove { id, force, json } => {
            if !force && !json {
                let rule = rules.get_rule(&user_id, id).await?;
                println!(
                    "\n{}",
                    format!(
                        "This will delete rule #{} ({} -> {}).",
                        rule.priority,
                        rule.patterns.join(", "),
                        rule.category_id
                    )
                    .yellow()
                );
                println!(
                    "{}\n",
                    "Transactions it already categorized keep their category.".dimmed()
                );

                if !Confirm::new()
                    .with_prompt("Are you sure?")
                    .default(false)
                    .interact()?
                {
                    println!("{}\n", "Cancelled".dimmed());
                    return Ok(());
                }
            }

            let result = rules.delete_rule(&user_id, id).await;
            if json {
                return print_json(result);
            }
            let removed = result?;
            output::success(&format!("Rule {} removed", removed.id));
        }
        RulesCommands::Reorder { ids, json } => {
            let ids = if ids.is_empty() && atty::isnt(atty::Stream::Stdin) {
                read_ids_from_stdin()?
            } else {
                ids
            };
            if ids.is_empty() {
                anyhow::bail!(
                    "No rule IDs provided. Pass them as arguments or pipe them from stdin."
                );
            }

            let result = rules.reorder_rules(&user_id, &ids).await;
            if json {
                return print_json(result);
            }
            print_rules(&result?);
        }
        RulesCommands::Up { id, json } => {
            let result = rules.move_rule_up(&user_id, id).await;
            if json {
                return print_json(result);
            }
            print_rules(&result?);
        }
        RulesCommands::Down { id, json } => {
            let result = rules.move_rule_down(&user_id, id).await;
            if json {
                return print_json(result);
            }
            print_rules(&result?);
        }
        RulesCommands::Test { text, patterns } => run_test(&text, &patterns)?,
    }

    Ok(())
}

fn run_test(text: &str, patterns: &[String]) -> Result<()> {
    if test_patterns(patterns, text) {
        output::success(&format!("Matches \"{}\"", text));
    } else {
        output::warning(&format!("No pattern matches \"{}\"", text));
    }
    Ok(())
}

/// Parse IDs from stdin, one per line or comma-separated
fn read_ids_from_stdin() -> Result<Vec<Uuid>> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    let trimmed = buffer.trim();

    let parts: Vec<&str> = if trimmed.contains('\n') {
        trimmed.lines().collect()
    } else {
        trimmed.split(',').collect()
    };

    parts
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Uuid::parse_str(s).map_err(|_| anyhow::anyhow!("Invalid rule ID: {}", s)))
        .collect()
}

fn print_rules(rules: &[Rule]) {
    if rules.is_empty() {
        output::info("No rules yet. Add one with: tally rules add -p <pattern> -c <category>");
        return;
    }

    let mut table = create_table();
    table.set_header(vec!["#", "ID", "Patterns", "Category", "Note", "Active"]);
    for rule in rules {
        table.add_row(vec![
            rule.priority.to_string(),
            rule.id.to_string(),
            truncate(&rule.patterns.join(", "), 60),
            rule.category_id.clone(),
            truncate(rule.user_description.as_deref().unwrap_or(""), 30),
            if rule.is_active { "yes".green().to_string() } else { "no".dimmed().to_string() },
        ]);
    }
    println!("{}", table);
}

fn print_rule_detail(rule: &Rule) {
    println!("{}", format!("Rule #{}", rule.priority).bold());
    println!("  ID:        {}", rule.id);
    println!("  Patterns:  {}", rule.patterns.join(", "));
    println!("  Category:  {}", rule.category_id);
    if let Some(note) = &rule.user_description {
        println!("  Note:      {}", note);
    }
    println!("  Active:    {}", if rule.is_active { "yes" } else { "no" });
    println!("  Updated:   {}", rule.updated_at.format("%Y-%m-%d %H:%M:%S"));
}
