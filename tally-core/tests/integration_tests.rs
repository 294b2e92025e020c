//! Integration tests for tally-core services
//!
//! These tests run the rule and categorization services against a real
//! DuckDB file in a temporary directory.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

use tally_core::adapters::demo::{demo_rules, generate_demo_transactions};
use tally_core::adapters::duckdb::DuckDbRepository;
use tally_core::domain::rule::priorities_are_dense;
use tally_core::services::{
    ApplyOptions, CategorizationService, EntryPoint, LogFilter, LoggingService, RuleService,
};
use tally_core::{Error, NewRule, RuleUpdate, SearchField, TallyContext, Transaction};

const USER: &str = "user-1";

// ============================================================================
// Test Helpers
// ============================================================================

/// Create a test repository with schema initialized
fn create_test_repo(temp_dir: &TempDir) -> Arc<DuckDbRepository> {
    let db_path = temp_dir.path().join("test.duckdb");
    let repo = DuckDbRepository::new(&db_path).expect("Failed to create repository");
    repo.ensure_schema().expect("Failed to initialize schema");
    Arc::new(repo)
}

fn services(repo: &Arc<DuckDbRepository>) -> (RuleService, CategorizationService) {
    (
        RuleService::new(repo.clone()),
        CategorizationService::new(repo.clone(), repo.clone()),
    )
}

fn create_test_transaction(name: &str) -> Transaction {
    Transaction::new(
        Uuid::new_v4(),
        name,
        Decimal::new(-2599, 2),
        NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
    )
}

fn category_of(repo: &DuckDbRepository, id: Uuid) -> Option<String> {
    repo.load_transactions(USER)
        .unwrap()
        .into_iter()
        .find(|t| t.id == id)
        .and_then(|t| t.category_id)
}

// ============================================================================
// Rule store
// ============================================================================

#[tokio::test]
async fn test_first_rule_for_user_has_priority_one() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let (rules, _) = services(&repo);

    let rule = rules
        .create_rule(USER, NewRule::new(["starbucks"], "coffee"))
        .await
        .unwrap();

    assert_eq!(rule.priority, 1);
    assert_eq!(repo.load_rules(USER).unwrap(), vec![rule]);
}

#[tokio::test]
async fn test_deleting_first_rule_promotes_second() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let (rules, _) = services(&repo);

    let r1 = rules.create_rule(USER, NewRule::new(["one"], "a")).await.unwrap();
    let r2 = rules.create_rule(USER, NewRule::new(["two"], "b")).await.unwrap();
    assert_eq!((r1.priority, r2.priority), (1, 2));

    rules.delete_rule(USER, r1.id).await.unwrap();

    let stored = repo.load_rules(USER).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, r2.id);
    assert_eq!(stored[0].priority, 1);
}

#[tokio::test]
async fn test_reorder_persists() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let (rules, _) = services(&repo);

    let r1 = rules.create_rule(USER, NewRule::new(["one"], "a")).await.unwrap();
    let r2 = rules.create_rule(USER, NewRule::new(["two"], "b")).await.unwrap();

    rules.reorder_rules(USER, &[r2.id, r1.id]).await.unwrap();

    // Fresh service over the same file sees the new order
    let reopened = RuleService::new(repo.clone());
    assert_eq!(reopened.get_rule(USER, r2.id).await.unwrap().priority, 1);
    assert_eq!(reopened.get_rule(USER, r1.id).await.unwrap().priority, 2);
}

#[tokio::test]
async fn test_overlapping_pattern_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let (rules, _) = services(&repo);

    rules
        .create_rule(USER, NewRule::new(["amazon", "amzn"], "shopping"))
        .await
        .unwrap();
    let err = rules
        .create_rule(USER, NewRule::new(["amazon prime", "amazon"], "subscriptions"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert!(err.to_string().contains("'amazon' already exists"));
    assert_eq!(repo.load_rules(USER).unwrap().len(), 1);
}

#[tokio::test]
async fn test_validation_errors() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let (rules, _) = services(&repo);

    let cases: Vec<Vec<String>> = vec![
        vec![],
        (0..6).map(|i| format!("p{}", i)).collect(),
        vec!["   ".to_string()],
        vec!["x".repeat(101)],
    ];
    for patterns in cases {
        let input = NewRule {
            patterns,
            category_id: "c".to_string(),
            user_description: None,
            is_active: true,
        };
        let err = rules.create_rule(USER, input).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "unexpected: {}", err);
    }

    // Exactly at the limits is fine
    let max = NewRule::new((0..5).map(|i| format!("{}{}", "y".repeat(99), i)), "c");
    assert!(rules.create_rule(USER, max).await.is_ok());
}

#[tokio::test]
async fn test_mixed_operations_keep_priorities_dense() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let (rules, _) = services(&repo);

    let mut ids = Vec::new();
    for i in 0..6 {
        let rule = rules
            .create_rule(USER, NewRule::new([format!("pattern-{}", i)], "c"))
            .await
            .unwrap();
        ids.push(rule.id);
    }

    rules.delete_rule(USER, ids[2]).await.unwrap();
    rules.move_rule_up(USER, ids[5]).await.unwrap();
    rules.move_rule_down(USER, ids[0]).await.unwrap();
    rules
        .update_rule(
            USER,
            ids[3],
            RuleUpdate {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    rules.delete_rule(USER, ids[5]).await.unwrap();

    let stored = repo.load_rules(USER).unwrap();
    assert_eq!(stored.len(), 4);
    assert!(priorities_are_dense(&stored));
}

// ============================================================================
// Application engine
// ============================================================================

#[tokio::test]
async fn test_user_description_outranks_other_fields() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let (rules, engine) = services(&repo);

    // Rules listed so the name rule would win if fields were pooled
    rules.create_rule(USER, NewRule::new(["c"], "from-name")).await.unwrap();
    rules.create_rule(USER, NewRule::new(["b"], "from-merchant")).await.unwrap();
    rules.create_rule(USER, NewRule::new(["a"], "from-description")).await.unwrap();

    let t = create_test_transaction("C")
        .with_merchant("B")
        .with_user_description("A");
    repo.replace_transactions(USER, &[t.clone()]).unwrap();

    let result = engine.apply(USER, ApplyOptions::default()).await.unwrap();
    assert_eq!(result.categorized, 1);
    assert_eq!(category_of(&repo, t.id).as_deref(), Some("from-description"));
}

#[tokio::test]
async fn test_merchant_name_match_despite_punctuated_name() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let (rules, engine) = services(&repo);

    rules
        .create_rule(USER, NewRule::new(["Camp Belly Rub LLC"], "pets"))
        .await
        .unwrap();
    let t = create_test_transaction("CAMP BELLY RUB, LLC").with_merchant("Camp Belly Rub LLC");
    repo.replace_transactions(USER, &[t.clone()]).unwrap();

    let preview = engine.preview(USER).await.unwrap();
    assert_eq!(preview[0].field, Some(SearchField::MerchantName));

    let result = engine.apply(USER, ApplyOptions::default()).await.unwrap();
    assert_eq!(result.categorized, 1);
    assert_eq!(category_of(&repo, t.id).as_deref(), Some("pets"));
}

#[tokio::test]
async fn test_apply_twice_categorizes_nothing_new() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let (rules, engine) = services(&repo);

    for rule in demo_rules() {
        rules.create_rule(USER, rule).await.unwrap();
    }
    let today = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
    let demo = generate_demo_transactions(today, 90);
    repo.append_transactions(USER, &demo).unwrap();

    let first = engine.apply(USER, ApplyOptions::default()).await.unwrap();
    assert!(first.categorized > 0);
    assert_eq!(first.total, demo.len());
    assert_eq!(first.categorized + first.unmatched, demo.len());

    let second = engine.apply(USER, ApplyOptions::default()).await.unwrap();
    assert_eq!(second.categorized, 0);
    assert_eq!(second.skipped, first.categorized);
}

#[tokio::test]
async fn test_force_reassigns_after_reorder() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let (rules, engine) = services(&repo);

    let coffee = rules.create_rule(USER, NewRule::new(["coffee"], "coffee")).await.unwrap();
    let shop = rules.create_rule(USER, NewRule::new(["shop"], "shopping")).await.unwrap();
    let t = create_test_transaction("CORNER COFFEE SHOP");
    repo.replace_transactions(USER, &[t.clone()]).unwrap();

    engine.apply(USER, ApplyOptions::default()).await.unwrap();
    assert_eq!(category_of(&repo, t.id).as_deref(), Some("coffee"));

    rules.reorder_rules(USER, &[shop.id, coffee.id]).await.unwrap();

    let unforced = engine.apply(USER, ApplyOptions::default()).await.unwrap();
    assert_eq!(unforced.skipped, 1);
    assert_eq!(category_of(&repo, t.id).as_deref(), Some("coffee"));

    let forced = engine
        .apply(
            USER,
            ApplyOptions {
                force_recategorize: true,
                dry_run: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(forced.recategorized, 1);
    assert_eq!(category_of(&repo, t.id).as_deref(), Some("shopping"));
}

#[tokio::test]
async fn test_users_are_isolated() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let (rules, engine) = services(&repo);

    rules.create_rule("alice", NewRule::new(["gym"], "fitness")).await.unwrap();
    let bob_tx = create_test_transaction("CITY GYM");
    repo.replace_transactions("bob", &[bob_tx]).unwrap();

    let result = engine.apply("bob", ApplyOptions::default()).await.unwrap();
    assert_eq!(result.categorized, 0);
    assert_eq!(result.unmatched, 1);
}

// ============================================================================
// Context and logging
// ============================================================================

#[tokio::test]
async fn test_context_logs_events() {
    let temp_dir = TempDir::new().unwrap();
    let logger =
        Arc::new(LoggingService::new(temp_dir.path(), EntryPoint::Library, "test").unwrap());
    let ctx = TallyContext::with_events(temp_dir.path(), Some(logger.clone())).unwrap();

    let rule = ctx
        .rule_service
        .create_rule(USER, NewRule::new(["rent"], "housing"))
        .await
        .unwrap();
    let _ = ctx.rule_service.move_rule_up(USER, rule.id).await;
    ctx.categorization_service
        .apply(USER, ApplyOptions::default())
        .await
        .unwrap();

    let events: Vec<String> = logger
        .list(&LogFilter::default(), 10)
        .unwrap()
        .into_iter()
        .map(|e| e.event)
        .collect();
    assert!(events.contains(&"rule_created".to_string()));
    assert!(events.contains(&"rule_moved_failed".to_string()));
    assert!(events.contains(&"rules_applied".to_string()));

    let errors_only = LogFilter {
        errors_only: true,
        ..Default::default()
    };
    let errors = logger.list(&errors_only, 10).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_message.as_deref(), Some("invalid_operation"));

    let for_rule = LogFilter {
        rule_id: Some(rule.id.to_string()),
        ..Default::default()
    };
    let rule_events: Vec<String> = logger
        .list(&for_rule, 10)
        .unwrap()
        .into_iter()
        .map(|e| e.event)
        .collect();
    assert_eq!(rule_events, vec!["rule_moved_failed", "rule_created"]);
}
