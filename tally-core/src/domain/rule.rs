//! Categorization rule domain entity
//!
//! A rule assigns a category to every transaction whose search text contains
//! one of its patterns. A user's rules form a single ordered list: `priority`
//! is the 1-based position in that list and is always dense (`1..=N`).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::result::{Error, Result};

/// Maximum number of patterns a single rule may carry
pub const MAX_PATTERNS: usize = 5;

/// Maximum length of a single pattern, in characters, after trimming
pub const MAX_PATTERN_LENGTH: usize = 100;

/// A categorization rule owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: Uuid,
    /// Trimmed patterns in the order the user entered them
    pub patterns: Vec<String>,
    /// Category assigned on match (owned by the category service)
    pub category_id: String,
    /// Free-text note, never used for matching
    pub user_description: Option<String>,
    pub is_active: bool,
    /// 1-based position in the user's rule list
    pub priority: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// Lowercased, trimmed patterns used for comparison
    pub fn pattern_keys(&self) -> Vec<String> {
        self.patterns.iter().map(|p| pattern_key(p)).collect()
    }
}

fn default_active() -> bool {
    true
}

/// Input for creating a rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRule {
    pub patterns: Vec<String>,
    pub category_id: String,
    #[serde(default)]
    pub user_description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl NewRule {
    /// Create an active rule input with no description
    pub fn new<S: Into<String>>(
        patterns: impl IntoIterator<Item = S>,
        category_id: impl Into<String>,
    ) -> Self {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
            category_id: category_id.into(),
            user_description: None,
            is_active: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.user_description = Some(description.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Partial update of a rule. `None` leaves a field untouched.
///
/// Priority is not part of an update; it only changes through delete,
/// reorder and move operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpdate {
    #[serde(default)]
    pub patterns: Option<Vec<String>>,
    #[serde(default)]
    pub category_id: Option<String>,
    /// `Some(None)` clears the description
    #[serde(default)]
    pub user_description: Option<Option<String>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl RuleUpdate {
    pub fn is_empty(&self) -> bool {
        self.patterns.is_none()
            && self.category_id.is_none()
            && self.user_description.is_none()
            && self.is_active.is_none()
    }
}

/// Comparison key for a pattern: trimmed and lowercased
pub fn pattern_key(pattern: &str) -> String {
    pattern.trim().to_lowercase()
}

/// Trim and validate a pattern list
///
/// Returns the trimmed patterns in input order. Fails on an empty list, more
/// than [`MAX_PATTERNS`] entries, blank entries, entries longer than
/// [`MAX_PATTERN_LENGTH`] characters, or the same pattern listed twice.
pub fn normalize_patterns(patterns: &[String]) -> Result<Vec<String>> {
    if patterns.is_empty() {
        return Err(Error::validation("At least one pattern is required"));
    }
    if patterns.len() > MAX_PATTERNS {
        return Err(Error::validation(format!(
            "A rule can have at most {} patterns (got {})",
            MAX_PATTERNS,
            patterns.len()
        )));
    }

    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(patterns.len());

    for raw in patterns {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::validation("Patterns cannot be empty"));
        }
        if trimmed.chars().count() > MAX_PATTERN_LENGTH {
            return Err(Error::validation(format!(
                "Pattern '{}' exceeds {} characters",
                trimmed, MAX_PATTERN_LENGTH
            )));
        }
        if !seen.insert(pattern_key(trimmed)) {
            return Err(Error::validation(format!(
                "Pattern '{}' is listed more than once",
                trimmed
            )));
        }
        normalized.push(trimmed.to_string());
    }

    Ok(normalized)
}

/// Find the first candidate pattern already owned by another rule
///
/// `exclude` is the id of the rule being updated, which may keep its own
/// patterns. Inactive rules count.
pub fn find_pattern_collision<'a>(
    candidates: &'a [String],
    rules: &[Rule],
    exclude: Option<Uuid>,
) -> Option<&'a str> {
    let taken: HashSet<String> = rules
        .iter()
        .filter(|r| Some(r.id) != exclude)
        .flat_map(|r| r.pattern_keys())
        .collect();

    candidates
        .iter()
        .find(|p| taken.contains(&pattern_key(p)))
        .map(String::as_str)
}

/// Error for a pattern that another rule already uses
pub fn collision_error(pattern: &str) -> Error {
    Error::validation(format!("Pattern '{}' already exists in another rule", pattern))
}

/// Assign `priority = index + 1` to an ordered rule list
///
/// This is the single place priorities are computed; every structural change
/// (create, delete, reorder, move) rearranges the list and then calls this.
/// Rules whose priority changes get `updated_at = now`.
pub fn reindex(rules: Vec<Rule>, now: DateTime<Utc>) -> Vec<Rule> {
    rules
        .into_iter()
        .enumerate()
        .map(|(index, mut rule)| {
            let priority = index as u32 + 1;
            if rule.priority != priority {
                rule.priority = priority;
                rule.updated_at = now;
            }
            rule
        })
        .collect()
}

/// Sort rules ascending by priority, breaking ties by creation time
pub fn sort_by_priority(rules: &mut [Rule]) {
    rules.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

/// True when the priorities are exactly `{1, ..., N}`
pub fn priorities_are_dense(rules: &[Rule]) -> bool {
    let mut priorities: Vec<u32> = rules.iter().map(|r| r.priority).collect();
    priorities.sort_unstable();
    priorities
        .iter()
        .enumerate()
        .all(|(index, &p)| p == index as u32 + 1)
}
