//! In-memory collection stores
//!
//! Keep each user's collection in a map behind a tokio `RwLock`. `save_all`
//! swaps the whole collection in one step, so readers never see a partly
//! written list.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::result::{Error, Result};
use crate::domain::{Rule, Transaction};
use crate::ports::{RuleCollectionStore, TransactionCollectionStore};

/// Rule lists keyed by user id
#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    rules: RwLock<HashMap<String, Vec<Rule>>>,
    saves: AtomicUsize,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save_all` calls
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RuleCollectionStore for InMemoryRuleStore {
    async fn get_all(&self, user_id: &str) -> Result<Vec<Rule>> {
        Ok(self.rules.read().await.get(user_id).cloned().unwrap_or_default())
    }

    async fn save_all(&self, user_id: &str, rules: &[Rule]) -> Result<()> {
        self.rules
            .write()
            .await
            .insert(user_id.to_string(), rules.to_vec());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Transaction batches keyed by user id
///
/// Counts bulk writes and can be told to fail them, which lets callers check
/// how often and how safely they write.
#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    transactions: RwLock<HashMap<String, Vec<Transaction>>>,
    saves: AtomicUsize,
    fail_writes: AtomicBool,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add transactions for a user without counting it as a save
    pub async fn insert(&self, user_id: &str, transactions: Vec<Transaction>) {
        self.transactions
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .extend(transactions);
    }

    /// Number of successful `save_all` calls
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransactionCollectionStore for InMemoryTransactionStore {
    async fn get_all(&self, user_id: &str) -> Result<Vec<Transaction>> {
        Ok(self
            .transactions
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_all(&self, user_id: &str, transactions: &[Transaction]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::database("write rejected"));
        }
        self.transactions
            .write()
            .await
            .insert(user_id.to_string(), transactions.to_vec());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
