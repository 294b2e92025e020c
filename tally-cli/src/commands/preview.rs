//! Preview command - show which rule wins for each transaction

use std::collections::HashMap;

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use super::get_context;
use crate::output::{self, create_table, print_json, truncate};
use tally_core::services::PreviewEntry;
use tally_core::Transaction;

/// Preview row joined with the transaction text it was computed from
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PreviewRow<'a> {
    #[serde(flatten)]
    entry: &'a PreviewEntry,
    name: &'a str,
    amount: String,
    date: String,
}

pub async fn run(user: Option<&str>, unmatched_only: bool, json: bool) -> Result<()> {
    let (ctx, user_id) = get_context("preview", user)?;

    let entries = ctx.categorization_service.preview(&user_id).await?;
    let transactions = ctx.repository.load_transactions(&user_id)?;
    let by_id: HashMap<_, &Transaction> = transactions.iter().map(|t| (t.id, t)).collect();

    let rows: Vec<PreviewRow> = entries
        .iter()
        .filter(|e| !unmatched_only || e.rule_id.is_none())
        .filter_map(|entry| {
            by_id.get(&entry.transaction_id).map(|t| PreviewRow {
                entry,
                name: &t.name,
                amount: t.amount.to_string(),
                date: t.transaction_date.to_string(),
            })
        })
        .collect();

    if json {
        return print_json(Ok(rows));
    }

    if rows.is_empty() {
        output::info("No transactions to preview.");
        return Ok(());
    }

    let mut table = create_table();
    table.set_header(vec!["Date", "Name", "Amount", "Matched on", "Current", "Would be"]);
    for row in &rows {
        let would_be = match &row.entry.category_id {
            Some(category) if row.entry.current_category_id.as_ref() != Some(category) => {
                category.green().to_string()
            }
            Some(category) => category.clone(),
            None => "-".dimmed().to_string(),
        };
        table.add_row(vec![
            row.date.clone(),
            truncate(row.name, 40),
            row.amount.clone(),
            row.entry
                .field
                .map(|f| f.to_string())
                .unwrap_or_else(|| "-".to_string()),
            row.entry.current_category_id.clone().unwrap_or_else(|| "-".to_string()),
            would_be,
        ]);
    }
    println!("{}", table);

    let matched = rows.iter().filter(|r| r.entry.rule_id.is_some()).count();
    println!("{} of {} transactions match a rule", matched, rows.len());

    Ok(())
}
