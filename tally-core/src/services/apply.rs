//! Categorization service - applies rules to a user's transactions
//!
//! One pass reads the rule list once and the transaction batch once, and
//! writes the batch back at most once. Nothing is written when no
//! transaction changed or when running dry.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{SearchField, Transaction};
use crate::ports::{RuleCollectionStore, TransactionCollectionStore};
use crate::services::logging::{EventSink, LogEvent};
use crate::services::matcher::{compile_active, first_match, SearchText};
use crate::services::user_lock::UserLocks;

/// Options for [`CategorizationService::apply`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Overwrite categories that are already set
    pub force_recategorize: bool,
    /// Compute the outcome without saving it
    pub dry_run: bool,
}

/// Counts from one apply pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResult {
    /// Previously uncategorized transactions that received a category
    pub categorized: usize,
    /// Already categorized transactions that were matched again (force only)
    pub recategorized: usize,
    /// Categorized transactions left alone because force was off
    pub skipped: usize,
    /// Transactions no active rule matched
    pub unmatched: usize,
    pub total: usize,
    pub message: String,
    pub dry_run: bool,
}

impl ApplyResult {
    fn summarize(&mut self) {
        let verb = if self.dry_run { "Would categorize" } else { "Categorized" };
        self.message = if self.total == 0 {
            "No transactions to categorize".to_string()
        } else if self.recategorized > 0 {
            format!(
                "{} {} of {} transactions ({} recategorized)",
                verb,
                self.categorized + self.recategorized,
                self.total,
                self.recategorized
            )
        } else {
            format!("{} {} of {} transactions", verb, self.categorized, self.total)
        };
    }
}

/// What apply would do to one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewEntry {
    pub transaction_id: Uuid,
    /// Field the match was made through, `None` when the transaction has no text
    pub field: Option<SearchField>,
    pub current_category_id: Option<String>,
    /// Winning rule, if any active rule matches
    pub rule_id: Option<Uuid>,
    pub category_id: Option<String>,
}

/// Service that runs the active rules over stored transactions
pub struct CategorizationService {
    rules: Arc<dyn RuleCollectionStore>,
    transactions: Arc<dyn TransactionCollectionStore>,
    events: Option<Arc<dyn EventSink>>,
    locks: UserLocks,
}

impl CategorizationService {
    pub fn new(
        rules: Arc<dyn RuleCollectionStore>,
        transactions: Arc<dyn TransactionCollectionStore>,
    ) -> Self {
        Self {
            rules,
            transactions,
            events: None,
            locks: UserLocks::default(),
        }
    }

    pub fn with_events(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Categorize the user's transactions with their active rules
    ///
    /// For each transaction the first matching rule by priority wins.
    /// Transactions that already have a category are skipped unless
    /// `force_recategorize` is set. The batch is saved with one write.
    pub async fn apply(&self, user_id: &str, options: ApplyOptions) -> Result<ApplyResult> {
        let result = self.apply_inner(user_id, options).await;

        if let Some(sink) = &self.events {
            let event = match &result {
                Ok(_) if options.dry_run => LogEvent::new("rules_applied_dry_run"),
                Ok(_) => LogEvent::new("rules_applied"),
                Err(e) => LogEvent::new("rules_applied_failed").with_error(e.kind()),
            };
            sink.record(event);
        }

        result
    }

    async fn apply_inner(&self, user_id: &str, options: ApplyOptions) -> Result<ApplyResult> {
        let _guard = self.locks.acquire(user_id).await;

        let rules = self.rules.get_all(user_id).await?;
        let mut transactions = self.transactions.get_all(user_id).await?;
        let compiled = compile_active(&rules);

        let mut result = ApplyResult {
            categorized: 0,
            recategorized: 0,
            skipped: 0,
            unmatched: 0,
            total: transactions.len(),
            message: String::new(),
            dry_run: options.dry_run,
        };
        let mut changed = false;

        for transaction in transactions.iter_mut() {
            if transaction.is_categorized() && !options.force_recategorize {
                result.skipped += 1;
                continue;
            }

            let winner = SearchText::of(transaction).and_then(|text| first_match(&text, &compiled));
            let Some(winner) = winner else {
                result.unmatched += 1;
                continue;
            };

            let category_id = &winner.rule.category_id;
            if transaction.is_categorized() {
                result.recategorized += 1;
            } else {
                result.categorized += 1;
            }
            if transaction.category_id.as_deref() != Some(category_id.as_str()) {
                transaction.category_id = Some(category_id.clone());
                changed = true;
            }
        }

        if changed && !options.dry_run {
            self.transactions.save_all(user_id, &transactions).await?;
        }

        result.summarize();
        Ok(result)
    }

    /// Show, per transaction, which rule would win and through which field
    ///
    /// Ignores existing categories, so the result is what a forced apply
    /// would assign.
    pub async fn preview(&self, user_id: &str) -> Result<Vec<PreviewEntry>> {
        let rules = self.rules.get_all(user_id).await?;
        let transactions = self.transactions.get_all(user_id).await?;
        let compiled = compile_active(&rules);

        Ok(transactions
            .iter()
            .map(|transaction: &Transaction| {
                let text = SearchText::of(transaction);
                let winner = text.as_ref().and_then(|t| first_match(t, &compiled));
                PreviewEntry {
                    transaction_id: transaction.id,
                    field: text.as_ref().map(|t| t.field),
                    current_category_id: transaction.category_id.clone(),
                    rule_id: winner.map(|w| w.rule.id),
                    category_id: winner.map(|w| w.rule.category_id.clone()),
                }
            })
            .collect())
    }
}
