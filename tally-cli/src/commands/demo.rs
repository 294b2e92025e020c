//! Demo command - seed demo transactions and starter rules

use anyhow::Result;
use serde_json::json;

use super::get_context;
use crate::output;
use tally_core::adapters::demo::{demo_rules, generate_demo_transactions};

pub async fn run(user: Option<&str>, days: u32, with_rules: bool, json: bool) -> Result<()> {
    let (ctx, user_id) = get_context("demo", user)?;

    let today = chrono::Utc::now().date_naive();
    let transactions = generate_demo_transactions(today, days);
    let inserted = ctx.repository.append_transactions(&user_id, &transactions)?;

    let mut rules_created = 0;
    let mut rules_skipped = 0;
    if with_rules {
        for rule in demo_rules() {
            // Rules the user already has (by pattern) are left alone
            match ctx.rule_service.create_rule(&user_id, rule).await {
                Ok(_) => rules_created += 1,
                Err(tally_core::Error::Validation(_)) => rules_skipped += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "user": user_id,
                "transactionsInserted": inserted,
                "rulesCreated": rules_created,
                "rulesSkipped": rules_skipped,
            }))?
        );
        return Ok(());
    }

    output::success(&format!(
        "Added {} demo transactions for user '{}'",
        inserted, user_id
    ));
    if with_rules {
        output::success(&format!("Created {} starter rules", rules_created));
        if rules_skipped > 0 {
            output::warning(&format!("Skipped {} rules that overlap existing ones", rules_skipped));
        }
    }
    output::info("Next: tally preview, then tally apply");

    Ok(())
}
