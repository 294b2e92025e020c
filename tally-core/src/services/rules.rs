//! Rule service - ordered, deduplicated rule lists
//!
//! Every mutation loads the user's full rule list in priority order, edits
//! the list, renumbers it with [`reindex`] and saves it back while holding the
//! user's lock. That keeps priorities dense (`1..=N`) and patterns unique
//! across the user's rules.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::rule::{
    collision_error, find_pattern_collision, normalize_patterns, reindex, sort_by_priority,
};
use crate::domain::{NewRule, Rule, RuleUpdate};
use crate::ports::{CategoryValidator, RuleCollectionStore, SyntacticCategoryValidator};
use crate::services::logging::{EventSink, LogEvent};
use crate::services::user_lock::UserLocks;

/// Direction for a single-step move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

impl MoveDirection {
    fn as_str(&self) -> &'static str {
        match self {
            MoveDirection::Up => "up",
            MoveDirection::Down => "down",
        }
    }
}

/// Service owning rule CRUD and ordering
pub struct RuleService {
    store: Arc<dyn RuleCollectionStore>,
    categories: Arc<dyn CategoryValidator>,
    events: Option<Arc<dyn EventSink>>,
    locks: UserLocks,
}

fn clean_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

fn position_of(rules: &[Rule], id: Uuid) -> Result<usize> {
    rules
        .iter()
        .position(|r| r.id == id)
        .ok_or_else(|| Error::not_found(format!("Rule {} not found", id)))
}

impl RuleService {
    /// Create a rule service over `store`, validating category ids syntactically
    pub fn new(store: Arc<dyn RuleCollectionStore>) -> Self {
        Self {
            store,
            categories: Arc::new(SyntacticCategoryValidator),
            events: None,
            locks: UserLocks::default(),
        }
    }

    /// Replace the category check, e.g. with one that knows the user's categories
    pub fn with_category_validator(mut self, validator: Arc<dyn CategoryValidator>) -> Self {
        self.categories = validator;
        self
    }

    pub fn with_events(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Record the outcome of an operation. Failures log only the error kind,
    /// since messages can quote user patterns.
    fn observe<T>(&self, event: &str, rule_id: Option<Uuid>, result: Result<T>) -> Result<T> {
        if let Some(sink) = &self.events {
            let mut log_event = match &result {
                Ok(_) => LogEvent::new(event),
                Err(e) => LogEvent::new(format!("{}_failed", event)).with_error(e.kind()),
            };
            if let Some(id) = rule_id {
                log_event = log_event.with_rule(id);
            }
            sink.record(log_event);
        }
        result
    }

    async fn load_ordered(&self, user_id: &str) -> Result<Vec<Rule>> {
        let mut rules = self.store.get_all(user_id).await?;
        sort_by_priority(&mut rules);
        Ok(rules)
    }

    /// All of the user's rules, ascending by priority
    pub async fn list_rules(&self, user_id: &str) -> Result<Vec<Rule>> {
        self.load_ordered(user_id).await
    }

    /// A single rule by id
    pub async fn get_rule(&self, user_id: &str, id: Uuid) -> Result<Rule> {
        let rules = self.store.get_all(user_id).await?;
        rules
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::not_found(format!("Rule {} not found", id)))
    }

    /// Create a rule at the end of the list (`priority = N + 1`)
    pub async fn create_rule(&self, user_id: &str, input: NewRule) -> Result<Rule> {
        let result = self.create_rule_inner(user_id, input).await;
        let rule_id = result.as_ref().ok().map(|r| r.id);
        self.observe("rule_created", rule_id, result)
    }

    async fn create_rule_inner(&self, user_id: &str, input: NewRule) -> Result<Rule> {
        self.categories.validate(&input.category_id)?;
        let patterns = normalize_patterns(&input.patterns)?;

        let _guard = self.locks.acquire(user_id).await;
        let mut rules = self.load_ordered(user_id).await?;

        if let Some(pattern) = find_pattern_collision(&patterns, &rules, None) {
            return Err(collision_error(pattern));
        }

        let now = Utc::now();
        let id = Uuid::new_v4();
        rules.push(Rule {
            id,
            patterns,
            category_id: input.category_id,
            user_description: clean_description(input.user_description),
            is_active: input.is_active,
            priority: rules.len() as u32 + 1,
            created_at: now,
            updated_at: now,
        });

        let rules = reindex(rules, now);
        self.store.save_all(user_id, &rules).await?;

        position_of(&rules, id).map(|index| rules[index].clone())
    }

    /// Replace any of patterns, category, description or active flag
    pub async fn update_rule(&self, user_id: &str, id: Uuid, update: RuleUpdate) -> Result<Rule> {
        let result = self.update_rule_inner(user_id, id, update).await;
        self.observe("rule_updated", Some(id), result)
    }

    async fn update_rule_inner(&self, user_id: &str, id: Uuid, update: RuleUpdate) -> Result<Rule> {
        if let Some(category_id) = &update.category_id {
            self.categories.validate(category_id)?;
        }
        let patterns = match &update.patterns {
            Some(patterns) => Some(normalize_patterns(patterns)?),
            None => None,
        };

        let _guard = self.locks.acquire(user_id).await;
        let mut rules = self.load_ordered(user_id).await?;
        let index = position_of(&rules, id)?;

        if update.is_empty() {
            return Ok(rules[index].clone());
        }

        if let Some(patterns) = &patterns {
            if let Some(pattern) = find_pattern_collision(patterns, &rules, Some(id)) {
                return Err(collision_error(pattern));
            }
        }

        let rule = &mut rules[index];
        if let Some(patterns) = patterns {
            rule.patterns = patterns;
        }
        if let Some(category_id) = update.category_id {
            rule.category_id = category_id;
        }
        if let Some(description) = update.user_description {
            rule.user_description = clean_description(description);
        }
        if let Some(is_active) = update.is_active {
            rule.is_active = is_active;
        }
        rule.updated_at = Utc::now();
        let updated = rule.clone();

        self.store.save_all(user_id, &rules).await?;
        Ok(updated)
    }

    /// Delete a rule and close the gap it leaves in the priorities
    pub async fn delete_rule(&self, user_id: &str, id: Uuid) -> Result<Rule> {
        let result = self.delete_rule_inner(user_id, id).await;
        self.observe("rule_deleted", Some(id), result)
    }

    async fn delete_rule_inner(&self, user_id: &str, id: Uuid) -> Result<Rule> {
        let _guard = self.locks.acquire(user_id).await;
        let mut rules = self.load_ordered(user_id).await?;
        let index = position_of(&rules, id)?;

        let removed = rules.remove(index);
        let rules = reindex(rules, Utc::now());
        self.store.save_all(user_id, &rules).await?;

        Ok(removed)
    }

    /// Set the order of all rules at once
    ///
    /// `ids` must contain every one of the user's rule ids exactly once.
    pub async fn reorder_rules(&self, user_id: &str, ids: &[Uuid]) -> Result<Vec<Rule>> {
        let result = self.reorder_rules_inner(user_id, ids).await;
        self.observe("rules_reordered", None, result)
    }

    async fn reorder_rules_inner(&self, user_id: &str, ids: &[Uuid]) -> Result<Vec<Rule>> {
        let _guard = self.locks.acquire(user_id).await;
        let mut remaining = self.load_ordered(user_id).await?;

        let mut seen = HashSet::new();
        if let Some(duplicate) = ids.iter().find(|id| !seen.insert(**id)) {
            return Err(Error::not_found(format!(
                "Rule {} listed more than once; every rule must appear exactly once",
                duplicate
            )));
        }

        let mut ordered = Vec::with_capacity(remaining.len());
        for id in ids {
            let index = position_of(&remaining, *id)?;
            ordered.push(remaining.swap_remove(index));
        }

        if let Some(missing) = remaining.first() {
            return Err(Error::not_found(format!(
                "Rule {} not found in the new order; every rule must appear exactly once",
                missing.id
            )));
        }

        let rules = reindex(ordered, Utc::now());
        self.store.save_all(user_id, &rules).await?;
        Ok(rules)
    }

    /// Swap a rule with its higher-priority neighbour
    pub async fn move_rule_up(&self, user_id: &str, id: Uuid) -> Result<Vec<Rule>> {
        self.move_rule(user_id, id, MoveDirection::Up).await
    }

    /// Swap a rule with its lower-priority neighbour
    pub async fn move_rule_down(&self, user_id: &str, id: Uuid) -> Result<Vec<Rule>> {
        self.move_rule(user_id, id, MoveDirection::Down).await
    }

    pub async fn move_rule(
        &self,
        user_id: &str,
        id: Uuid,
        direction: MoveDirection,
    ) -> Result<Vec<Rule>> {
        let result = self.move_rule_inner(user_id, id, direction).await;
        self.observe("rule_moved", Some(id), result)
    }

    async fn move_rule_inner(
        &self,
        user_id: &str,
        id: Uuid,
        direction: MoveDirection,
    ) -> Result<Vec<Rule>> {
        let _guard = self.locks.acquire(user_id).await;
        let mut rules = self.load_ordered(user_id).await?;
        let index = position_of(&rules, id)?;

        let neighbour = match direction {
            MoveDirection::Up if index == 0 => None,
            MoveDirection::Up => Some(index - 1),
            MoveDirection::Down if index + 1 >= rules.len() => None,
            MoveDirection::Down => Some(index + 1),
        };
        let Some(neighbour) = neighbour else {
            let edge = if direction == MoveDirection::Up { "top" } else { "bottom" };
            return Err(Error::invalid_operation(format!(
                "Cannot move rule {}: it is already at the {}",
                direction.as_str(),
                edge
            )));
        };

        rules.swap(index, neighbour);
        let rules = reindex(rules, Utc::now());
        self.store.save_all(user_id, &rules).await?;
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryRuleStore;
    use crate::domain::rule::priorities_are_dense;
    use std::sync::Mutex;

    const USER: &str = "user-1";

    fn service() -> RuleService {
        RuleService::new(Arc::new(InMemoryRuleStore::new()))
    }

    fn ids(rules: &[Rule]) -> Vec<Uuid> {
        rules.iter().map(|r| r.id).collect()
    }

    #[tokio::test]
    async fn test_first_rule_gets_priority_one() {
        let svc = service();
        let rule = svc
            .create_rule(USER, NewRule::new(["starbucks"], "coffee"))
            .await
            .unwrap();

        assert_eq!(rule.priority, 1);
        assert_eq!(rule.patterns, vec!["starbucks"]);
        assert_eq!(rule.category_id, "coffee");
        assert!(rule.is_active);
    }

    #[tokio::test]
    async fn test_creation_appends() {
        let svc = service();
        for (i, pattern) in ["a", "b", "c"].iter().enumerate() {
            let rule = svc.create_rule(USER, NewRule::new([*pattern], "cat")).await.unwrap();
            assert_eq!(rule.priority, i as u32 + 1);
        }
    }

    #[tokio::test]
    async fn test_collision_rejected() {
        let svc = service();
        svc.create_rule(USER, NewRule::new(["amazon", "amzn"], "shopping"))
            .await
            .unwrap();

        let err = svc
            .create_rule(USER, NewRule::new(["amazon prime", "Amazon "], "subscriptions"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("already exists"));
        assert_eq!(svc.list_rules(USER).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_collision_checks_inactive_rules() {
        let svc = service();
        svc.create_rule(USER, NewRule::new(["gym"], "fitness").inactive())
            .await
            .unwrap();

        let err = svc
            .create_rule(USER, NewRule::new(["GYM"], "health"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_patterns_are_per_user() {
        let svc = service();
        svc.create_rule("alice", NewRule::new(["rent"], "housing")).await.unwrap();
        let bob_rule = svc.create_rule("bob", NewRule::new(["rent"], "housing")).await.unwrap();
        assert_eq!(bob_rule.priority, 1);
    }

    #[tokio::test]
    async fn test_unknown_category_is_accepted() {
        let svc = service();
        let rule = svc
            .create_rule(USER, NewRule::new(["x"], "category-that-does-not-exist"))
            .await
            .unwrap();
        assert_eq!(rule.category_id, "category-that-does-not-exist");
    }

    #[tokio::test]
    async fn test_blank_category_rejected() {
        let svc = service();
        let err = svc.create_rule(USER, NewRule::new(["x"], "  ")).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_may_keep_own_patterns() {
        let svc = service();
        let rule = svc.create_rule(USER, NewRule::new(["uber"], "transport")).await.unwrap();

        let update = RuleUpdate {
            patterns: Some(vec!["UBER".to_string(), "lyft".to_string()]),
            is_active: Some(false),
            ..Default::default()
        };
        let updated = svc.update_rule(USER, rule.id, update).await.unwrap();

        assert_eq!(updated.patterns, vec!["UBER", "lyft"]);
        assert!(!updated.is_active);
        assert_eq!(updated.priority, 1);
        assert!(updated.updated_at >= rule.updated_at);
    }

    #[tokio::test]
    async fn test_update_collision_with_other_rule() {
        let svc = service();
        svc.create_rule(USER, NewRule::new(["netflix"], "streaming")).await.unwrap();
        let second = svc.create_rule(USER, NewRule::new(["hulu"], "streaming")).await.unwrap();

        let update = RuleUpdate {
            patterns: Some(vec!["Netflix".to_string()]),
            ..Default::default()
        };
        let err = svc.update_rule(USER, second.id, update).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_update_unknown_rule() {
        let svc = service();
        let err = svc
            .update_rule(USER, Uuid::new_v4(), RuleUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_description_set_and_clear() {
        let svc = service();
        let rule = svc.create_rule(USER, NewRule::new(["spotify"], "music")).await.unwrap();

        let update = RuleUpdate {
            user_description: Some(Some("family plan".to_string())),
            ..Default::default()
        };
        let updated = svc.update_rule(USER, rule.id, update).await.unwrap();
        assert_eq!(updated.user_description.as_deref(), Some("family plan"));

        let clear = RuleUpdate {
            user_description: Some(None),
            ..Default::default()
        };
        let cleared = svc.update_rule(USER, rule.id, clear).await.unwrap();
        assert_eq!(cleared.user_description, None);
    }

    #[tokio::test]
    async fn test_delete_compacts_priorities() {
        let svc = service();
        let r1 = svc.create_rule(USER, NewRule::new(["one"], "c")).await.unwrap();
        let r2 = svc.create_rule(USER, NewRule::new(["two"], "c")).await.unwrap();
        let r3 = svc.create_rule(USER, NewRule::new(["three"], "c")).await.unwrap();

        let removed = svc.delete_rule(USER, r2.id).await.unwrap();
        assert_eq!(removed.id, r2.id);

        let rules = svc.list_rules(USER).await.unwrap();
        assert_eq!(ids(&rules), vec![r1.id, r3.id]);
        assert_eq!(rules[0].priority, 1);
        assert_eq!(rules[1].priority, 2);
    }

    #[tokio::test]
    async fn test_delete_first_promotes_second() {
        let svc = service();
        let r1 = svc.create_rule(USER, NewRule::new(["one"], "c")).await.unwrap();
        let r2 = svc.create_rule(USER, NewRule::new(["two"], "c")).await.unwrap();

        svc.delete_rule(USER, r1.id).await.unwrap();

        assert_eq!(svc.get_rule(USER, r2.id).await.unwrap().priority, 1);
    }

    #[tokio::test]
    async fn test_delete_unknown_rule() {
        let svc = service();
        let err = svc.delete_rule(USER, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_reorder_swaps_two_rules() {
        let svc = service();
        let r1 = svc.create_rule(USER, NewRule::new(["one"], "c")).await.unwrap();
        let r2 = svc.create_rule(USER, NewRule::new(["two"], "c")).await.unwrap();

        let rules = svc.reorder_rules(USER, &[r2.id, r1.id]).await.unwrap();

        assert_eq!(ids(&rules), vec![r2.id, r1.id]);
        assert_eq!(svc.get_rule(USER, r2.id).await.unwrap().priority, 1);
        assert_eq!(svc.get_rule(USER, r1.id).await.unwrap().priority, 2);
    }

    #[tokio::test]
    async fn test_reorder_rejects_partial_unknown_and_duplicate_lists() {
        let svc = service();
        let r1 = svc.create_rule(USER, NewRule::new(["one"], "c")).await.unwrap();
        let r2 = svc.create_rule(USER, NewRule::new(["two"], "c")).await.unwrap();

        let missing = svc.reorder_rules(USER, &[r2.id]).await.unwrap_err();
        assert!(matches!(missing, Error::NotFound(_)));
        assert!(missing.to_string().contains("not found"));

        let unknown = svc.reorder_rules(USER, &[r2.id, r1.id, Uuid::new_v4()]).await.unwrap_err();
        assert!(matches!(unknown, Error::NotFound(_)));

        let duplicate = svc.reorder_rules(USER, &[r1.id, r1.id]).await.unwrap_err();
        assert!(matches!(duplicate, Error::NotFound(_)));

        // Nothing changed
        let rules = svc.list_rules(USER).await.unwrap();
        assert_eq!(ids(&rules), vec![r1.id, r2.id]);
    }

    #[tokio::test]
    async fn test_move_up_and_down() {
        let svc = service();
        let r1 = svc.create_rule(USER, NewRule::new(["one"], "c")).await.unwrap();
        let r2 = svc.create_rule(USER, NewRule::new(["two"], "c")).await.unwrap();
        let r3 = svc.create_rule(USER, NewRule::new(["three"], "c")).await.unwrap();

        let rules = svc.move_rule_up(USER, r3.id).await.unwrap();
        assert_eq!(ids(&rules), vec![r1.id, r3.id, r2.id]);

        let rules = svc.move_rule_down(USER, r1.id).await.unwrap();
        assert_eq!(ids(&rules), vec![r3.id, r1.id, r2.id]);
        assert!(priorities_are_dense(&rules));
    }

    #[tokio::test]
    async fn test_move_past_boundary_fails() {
        let svc = service();
        let r1 = svc.create_rule(USER, NewRule::new(["one"], "c")).await.unwrap();
        let r2 = svc.create_rule(USER, NewRule::new(["two"], "c")).await.unwrap();

        let up = svc.move_rule_up(USER, r1.id).await.unwrap_err();
        assert!(matches!(up, Error::InvalidOperation(_)));
        assert!(up.to_string().contains("Cannot move"));

        let down = svc.move_rule_down(USER, r2.id).await.unwrap_err();
        assert!(matches!(down, Error::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn test_priorities_stay_dense_through_mixed_operations() {
        let svc = service();
        let mut created = Vec::new();
        for pattern in ["a", "b", "c", "d", "e"] {
            created.push(svc.create_rule(USER, NewRule::new([pattern], "c")).await.unwrap());
        }

        svc.delete_rule(USER, created[1].id).await.unwrap();
        svc.move_rule_up(USER, created[4].id).await.unwrap();
        svc.delete_rule(USER, created[0].id).await.unwrap();
        svc.create_rule(USER, NewRule::new(["f"], "c")).await.unwrap();

        let mut order = ids(&svc.list_rules(USER).await.unwrap());
        order.reverse();
        svc.reorder_rules(USER, &order).await.unwrap();
        svc.move_rule_down(USER, order[0]).await.unwrap();

        let rules = svc.list_rules(USER).await.unwrap();
        assert_eq!(rules.len(), 4);
        assert!(priorities_are_dense(&rules));
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<LogEvent>>,
    }

    impl EventSink for RecordingSink {
        fn record(&self, event: LogEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[tokio::test]
    async fn test_events_do_not_leak_patterns() {
        let sink = Arc::new(RecordingSink::default());
        let svc = service().with_events(sink.clone());

        let rule = svc.create_rule(USER, NewRule::new(["secret shop"], "c")).await.unwrap();
        let _ = svc.create_rule(USER, NewRule::new(["Secret Shop"], "c")).await;

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, "rule_created");
        assert_eq!(events[0].rule_id, Some(rule.id.to_string()));
        assert_eq!(events[1].event, "rule_created_failed");
        assert_eq!(events[1].error_message.as_deref(), Some("validation"));
    }

    /// Only knows a fixed set of categories
    struct KnownCategories(&'static [&'static str]);

    impl CategoryValidator for KnownCategories {
        fn validate(&self, category_id: &str) -> Result<()> {
            if self.0.iter().any(|known| *known == category_id) {
                Ok(())
            } else {
                Err(Error::validation(format!("Unknown category '{}'", category_id)))
            }
        }
    }

    #[tokio::test]
    async fn test_custom_category_validator() {
        let store = Arc::new(InMemoryRuleStore::new());
        let svc = RuleService::new(store.clone())
            .with_category_validator(Arc::new(KnownCategories(&["groceries"])));

        let rule = svc
            .create_rule(USER, NewRule::new(["market"], "groceries"))
            .await
            .unwrap();
        assert_eq!(store.save_count(), 1);

        let err = svc
            .create_rule(USER, NewRule::new(["casino"], "gambling"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("Unknown category 'gambling'"));

        let update = RuleUpdate {
            category_id: Some("gambling".to_string()),
            ..Default::default()
        };
        let err = svc.update_rule(USER, rule.id, update).await.unwrap_err();
        assert!(err.to_string().contains("Unknown category 'gambling'"));

        assert_eq!(store.save_count(), 1);
        let rules = svc.list_rules(USER).await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].category_id, "groceries");
    }
}
