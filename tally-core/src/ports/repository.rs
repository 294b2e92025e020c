//! Repository ports - collection storage abstraction
//!
//! The engine always reads and writes a user's whole collection at once.
//! `save_all` has replace semantics and must be atomic: after it returns an
//! error, the stored collection is exactly what it was before the call.

use async_trait::async_trait;

use crate::domain::result::Result;
use crate::domain::{Rule, Transaction};

/// Persistence for the full per-user rule list
#[async_trait]
pub trait RuleCollectionStore: Send + Sync {
    /// All rules owned by the user, in no particular order
    async fn get_all(&self, user_id: &str) -> Result<Vec<Rule>>;

    /// Replace the user's rule list
    async fn save_all(&self, user_id: &str, rules: &[Rule]) -> Result<()>;
}

/// Persistence for the full per-user transaction set
#[async_trait]
pub trait TransactionCollectionStore: Send + Sync {
    /// All transactions owned by the user
    async fn get_all(&self, user_id: &str) -> Result<Vec<Transaction>>;

    /// Replace the user's transaction set
    async fn save_all(&self, user_id: &str, transactions: &[Transaction]) -> Result<()>;
}
