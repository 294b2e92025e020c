//! Pattern matcher - pure transaction/rule matching
//!
//! A transaction is matched through exactly one field, picked by
//! [`Transaction::search_text`]. A rule matches when any of its patterns is a
//! case-insensitive substring of that text.

use serde::Serialize;

use crate::domain::rule::pattern_key;
use crate::domain::{Rule, SearchField, Transaction};

/// Lowercased search text of one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchText {
    pub field: SearchField,
    normalized: String,
}

impl SearchText {
    /// Select and normalize the search text, `None` if the transaction has
    /// no populated text field
    pub fn of(transaction: &Transaction) -> Option<Self> {
        transaction.search_text().map(|(field, text)| Self {
            field,
            normalized: text.to_lowercase(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.normalized
    }
}

/// A rule with its patterns normalized once for a whole matching pass
#[derive(Debug, Clone)]
pub struct CompiledRule<'a> {
    pub rule: &'a Rule,
    keys: Vec<String>,
}

impl<'a> CompiledRule<'a> {
    pub fn new(rule: &'a Rule) -> Self {
        Self {
            rule,
            keys: rule.pattern_keys(),
        }
    }

    /// OR over all patterns
    pub fn matches(&self, text: &SearchText) -> bool {
        self.keys.iter().any(|key| text.as_str().contains(key.as_str()))
    }
}

/// Compile active rules in ascending priority order
pub fn compile_active(rules: &[Rule]) -> Vec<CompiledRule<'_>> {
    let mut active: Vec<&Rule> = rules.iter().filter(|r| r.is_active).collect();
    active.sort_by_key(|r| r.priority);
    active.into_iter().map(CompiledRule::new).collect()
}

/// First rule (in the given order) that matches the text
pub fn first_match<'r, 'a>(
    text: &SearchText,
    rules: &'r [CompiledRule<'a>],
) -> Option<&'r CompiledRule<'a>> {
    rules.iter().find(|compiled| compiled.matches(text))
}

/// Whether `rule` matches `transaction`
///
/// Convenience for one-off checks; batch callers should compile rules and
/// build the [`SearchText`] once instead.
pub fn matches(transaction: &Transaction, rule: &Rule) -> bool {
    match SearchText::of(transaction) {
        Some(text) => CompiledRule::new(rule).matches(&text),
        None => false,
    }
}

/// Whether any of `patterns` would match `text`, using rule semantics
pub fn test_patterns(patterns: &[String], text: &str) -> bool {
    let text = text.to_lowercase();
    patterns
        .iter()
        .map(|p| pattern_key(p))
        .filter(|key| !key.is_empty())
        .any(|key| text.contains(&key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn rule(patterns: &[&str], priority: u32) -> Rule {
        let now = Utc::now();
        Rule {
            id: Uuid::new_v4(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            category_id: format!("cat-{}", priority),
            user_description: None,
            is_active: true,
            priority,
            created_at: now,
            updated_at: now,
        }
    }

    fn tx(name: &str) -> Transaction {
        Transaction::new(
            Uuid::new_v4(),
            name,
            Decimal::new(-899, 2),
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
        )
    }

    #[test]
    fn test_case_insensitive_substring() {
        let t = tx("ignored").with_user_description("I shopped at walmart today");
        assert!(matches(&t, &rule(&["WALMART"], 1)));
    }

    #[test]
    fn test_any_pattern_matches() {
        let t = tx("AMZN Mktp US*2K3");
        assert!(matches(&t, &rule(&["amazon", "amzn"], 1)));
        assert!(!matches(&t, &rule(&["netflix", "hulu"], 1)));
    }

    #[test]
    fn test_lower_priority_field_is_not_consulted() {
        // name would match, but the user description takes precedence
        let t = tx("STARBUCKS #123").with_user_description("Coffee with Sam");
        assert!(!matches(&t, &rule(&["starbucks"], 1)));
        assert!(matches(&t, &rule(&["coffee"], 1)));
    }

    #[test]
    fn test_merchant_match_ignores_punctuated_name() {
        let t = tx("CAMP BELLY RUB, LLC").with_merchant("Camp Belly Rub LLC");
        assert!(matches(&t, &rule(&["Camp Belly Rub LLC"], 1)));
    }

    #[test]
    fn test_no_text_never_matches() {
        let t = tx("");
        assert!(!matches(&t, &rule(&["a"], 1)));
        assert!(SearchText::of(&t).is_none());
    }

    #[test]
    fn test_compile_active_orders_and_filters() {
        let mut inactive = rule(&["x"], 1);
        inactive.is_active = false;
        let rules = vec![rule(&["c"], 3), inactive, rule(&["b"], 2)];

        let compiled = compile_active(&rules);
        let priorities: Vec<u32> = compiled.iter().map(|c| c.rule.priority).collect();
        assert_eq!(priorities, vec![2, 3]);
    }

    #[test]
    fn test_first_match_wins() {
        let rules = vec![rule(&["coffee"], 1), rule(&["coffee shop"], 2)];
        let compiled = compile_active(&rules);
        let text = SearchText::of(&tx("Corner Coffee Shop")).unwrap();

        let winner = first_match(&text, &compiled).unwrap();
        assert_eq!(winner.rule.priority, 1);
    }

    #[test]
    fn test_test_patterns() {
        let patterns = vec!["  Uber ".to_string(), "lyft".to_string()];
        assert!(test_patterns(&patterns, "UBER *TRIP"));
        assert!(test_patterns(&patterns, "Lyft ride"));
        assert!(!test_patterns(&patterns, "Taxi"));
        assert!(!test_patterns(&["   ".to_string()], "anything"));
    }
}
