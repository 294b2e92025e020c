//! Apply command - run active rules over transactions

use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use super::get_context;
use crate::output::{self, print_json};
use tally_core::services::ApplyOptions;

pub async fn run(user: Option<&str>, force: bool, dry_run: bool, json: bool) -> Result<()> {
    let (ctx, user_id) = get_context("apply", user)?;
    let options = ApplyOptions {
        force_recategorize: force,
        dry_run,
    };

    if json {
        let result = ctx.categorization_service.apply(&user_id, options).await;
        return print_json(result);
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
    spinner.set_message("Applying rules...");
    spinner.enable_steady_tick(Duration::from_millis(80));

    let result = ctx.categorization_service.apply(&user_id, options).await;
    spinner.finish_and_clear();
    let result = result?;

    if dry_run {
        output::info("Dry run: nothing was saved");
    }
    output::success(&result.message);
    println!("  Newly categorized: {}", result.categorized);
    if force {
        println!("  Recategorized:     {}", result.recategorized);
    } else if result.skipped > 0 {
        println!(
            "  Already set:       {} {}",
            result.skipped,
            "(use --force to recategorize)".dimmed()
        );
    }
    println!("  No matching rule:  {}", result.unmatched);

    Ok(())
}
