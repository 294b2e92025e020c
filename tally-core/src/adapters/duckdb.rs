//! DuckDB repository implementation

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use duckdb::{params, Connection};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{self, Error};
use crate::domain::{Rule, Transaction};
use crate::ports::{RuleCollectionStore, TransactionCollectionStore};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// Raw sys_rules row before parsing
struct RuleRow {
    id: String,
    patterns: String,
    category_id: String,
    user_description: Option<String>,
    is_active: bool,
    priority: i32,
    created_at: String,
    updated_at: String,
}

/// Raw sys_transactions row before parsing
struct TransactionRow {
    id: String,
    name: String,
    merchant_name: Option<String>,
    user_description: Option<String>,
    category_id: Option<String>,
    amount: String,
    transaction_date: String,
}

/// DuckDB repository implementation
///
/// Implements both collection ports. Every `replace_*` call runs inside a
/// single database transaction, so a failed write leaves the previous
/// collection in place. Port calls run on tokio's blocking pool.
#[derive(Clone)]
pub struct DuckDbRepository {
    conn: Arc<Mutex<Connection>>,
    db_path: Option<PathBuf>,
}

impl DuckDbRepository {
    /// Open (or create) the database file at `db_path`
    ///
    /// Includes retry logic with exponential backoff for file locking errors,
    /// which show up when two `tally` processes start at the same time.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Arc::new(Mutex::new(conn)),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[tally] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("Failed to open database after {} retries", MAX_RETRIES)))
    }

    /// In-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory_with_flags(config)?)),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Extension autoloading stays off; JSON is linked statically
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned"))
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Run database migrations using the MigrationService
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.conn()?;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    // === Rule operations ===

    pub fn load_rules(&self, user_id: &str) -> Result<Vec<Rule>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT rule_id, patterns, category_id, user_description, is_active, priority,
                    created_at, updated_at
             FROM sys_rules WHERE user_id = ? ORDER BY priority",
        )?;

        let rows = stmt
            .query_map([user_id], |row| {
                Ok(RuleRow {
                    id: row.get(0)?,
                    patterns: row.get(1)?,
                    category_id: row.get(2)?,
                    user_description: row.get(3)?,
                    is_active: row.get(4)?,
                    priority: row.get(5)?,
                    created_at: row.get(6)?,
                    updated_at: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(row_to_rule).collect()
    }

    /// Replace the user's rule list in one transaction
    pub fn replace_rules(&self, user_id: &str, rules: &[Rule]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM sys_rules WHERE user_id = ?", [user_id])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sys_rules (rule_id, user_id, patterns, category_id, user_description,
                                        is_active, priority, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for rule in rules {
                stmt.execute(params![
                    rule.id.to_string(),
                    user_id,
                    serde_json::to_string(&rule.patterns)?,
                    rule.category_id,
                    rule.user_description,
                    rule.is_active,
                    rule.priority as i32,
                    rule.created_at.to_rfc3339(),
                    rule.updated_at.to_rfc3339(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    // === Transaction operations ===

    pub fn load_transactions(&self, user_id: &str) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT transaction_id, name, merchant_name, user_description, category_id,
                    amount::VARCHAR, transaction_date::VARCHAR
             FROM sys_transactions WHERE user_id = ?
             ORDER BY transaction_date DESC, transaction_id",
        )?;

        let rows = stmt
            .query_map([user_id], |row| {
                Ok(TransactionRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    merchant_name: row.get(2)?,
                    user_description: row.get(3)?,
                    category_id: row.get(4)?,
                    amount: row.get(5)?,
                    transaction_date: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(row_to_transaction).collect()
    }

    /// Replace the user's transaction set in one transaction
    pub fn replace_transactions(
        &self,
        user_id: &str,
        transactions: &[Transaction],
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM sys_transactions WHERE user_id = ?", [user_id])?;
        insert_transactions(&tx, user_id, transactions)?;
        tx.commit()?;
        Ok(())
    }

    /// Add transactions without touching existing ones (used for seeding)
    pub fn append_transactions(
        &self,
        user_id: &str,
        transactions: &[Transaction],
    ) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        insert_transactions(&tx, user_id, transactions)?;
        tx.commit()?;
        Ok(transactions.len())
    }

    pub fn transaction_count(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM sys_transactions WHERE user_id = ?",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn insert_transactions(
    conn: &Connection,
    user_id: &str,
    transactions: &[Transaction],
) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO sys_transactions (transaction_id, user_id, name, merchant_name,
                                       user_description, category_id, amount, transaction_date)
         VALUES (?, ?, ?, ?, ?, ?, CAST(? AS DECIMAL(15, 2)), CAST(? AS DATE))",
    )?;
    for t in transactions {
        stmt.execute(params![
            t.id.to_string(),
            user_id,
            t.name,
            t.merchant_name,
            t.user_description,
            t.category_id,
            t.amount.to_string(),
            t.transaction_date.format("%Y-%m-%d").to_string(),
        ])?;
    }
    Ok(())
}

fn row_to_rule(row: RuleRow) -> Result<Rule> {
    Ok(Rule {
        id: Uuid::parse_str(&row.id).with_context(|| format!("Invalid rule id '{}'", row.id))?,
        patterns: serde_json::from_str(&row.patterns)
            .with_context(|| format!("Invalid patterns for rule {}", row.id))?,
        category_id: row.category_id,
        user_description: row.user_description,
        is_active: row.is_active,
        priority: u32::try_from(row.priority)
            .with_context(|| format!("Invalid priority for rule {}", row.id))?,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
    })
}

fn row_to_transaction(row: TransactionRow) -> Result<Transaction> {
    Ok(Transaction {
        id: Uuid::parse_str(&row.id)
            .with_context(|| format!("Invalid transaction id '{}'", row.id))?,
        name: row.name,
        merchant_name: row.merchant_name,
        user_description: row.user_description,
        category_id: row.category_id,
        amount: Decimal::from_str(&row.amount)
            .with_context(|| format!("Invalid amount '{}'", row.amount))?,
        transaction_date: parse_date(&row.transaction_date)?,
    })
}

// Helper functions

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp '{}'", s))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Invalid date '{}'", s))
}

fn port_error(e: anyhow::Error) -> Error {
    Error::database(format!("{:#}", e))
}

impl DuckDbRepository {
    /// Run a blocking repository call off the async worker threads
    async fn run_blocking<T, F>(&self, f: F) -> result::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&DuckDbRepository) -> Result<T> + Send + 'static,
    {
        let repo = self.clone();
        tokio::task::spawn_blocking(move || f(&repo))
            .await
            .map_err(|e| Error::database(format!("Database task failed: {}", e)))?
            .map_err(port_error)
    }
}

#[async_trait]
impl RuleCollectionStore for DuckDbRepository {
    async fn get_all(&self, user_id: &str) -> result::Result<Vec<Rule>> {
        let user_id = user_id.to_string();
        self.run_blocking(move |repo| repo.load_rules(&user_id)).await
    }

    async fn save_all(&self, user_id: &str, rules: &[Rule]) -> result::Result<()> {
        let user_id = user_id.to_string();
        let rules = rules.to_vec();
        self.run_blocking(move |repo| repo.replace_rules(&user_id, &rules)).await
    }
}

#[async_trait]
impl TransactionCollectionStore for DuckDbRepository {
    async fn get_all(&self, user_id: &str) -> result::Result<Vec<Transaction>> {
        let user_id = user_id.to_string();
        self.run_blocking(move |repo| repo.load_transactions(&user_id)).await
    }

    async fn save_all(&self, user_id: &str, transactions: &[Transaction]) -> result::Result<()> {
        let user_id = user_id.to_string();
        let transactions = transactions.to_vec();
        self.run_blocking(move |repo| repo.replace_transactions(&user_id, &transactions)).await
    }
}
