//! Tally Core - rule-based transaction categorization
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Rule, Transaction) and their invariants
//! - **ports**: Trait definitions for external dependencies (collection stores,
//!   category validation)
//! - **services**: Rule management, pattern matching and rule application
//! - **adapters**: Concrete implementations (DuckDB, in-memory, demo data)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use adapters::duckdb::DuckDbRepository;
use config::Config;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult};
pub use domain::{NewRule, Rule, RuleUpdate, SearchField, Transaction};

/// File name of the main database inside the data directory
pub const DB_FILENAME: &str = "tally.duckdb";

/// Main context for Tally operations
///
/// Holds the configuration, the DuckDB repository and the services wired
/// to it. Both services share the same repository.
pub struct TallyContext {
    pub config: Config,
    pub data_dir: PathBuf,
    pub repository: Arc<DuckDbRepository>,
    pub rule_service: RuleService,
    pub categorization_service: CategorizationService,
}

impl TallyContext {
    /// Create a new context whose services report to `events`
    pub fn with_events(data_dir: &Path, events: Option<Arc<dyn EventSink>>) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let config = Config::load(data_dir)?;

        let repository = Arc::new(DuckDbRepository::new(&data_dir.join(DB_FILENAME))?);
        repository.ensure_schema()?;

        let mut rule_service = RuleService::new(repository.clone());
        let mut categorization_service =
            CategorizationService::new(repository.clone(), repository.clone());
        if let Some(sink) = events {
            rule_service = rule_service.with_events(Arc::clone(&sink));
            categorization_service = categorization_service.with_events(sink);
        }

        Ok(Self {
            config,
            data_dir: data_dir.to_path_buf(),
            repository,
            rule_service,
            categorization_service,
        })
    }

    /// Active user for this context, see [`Config::resolve_user`]
    pub fn user_id(&self, explicit: Option<&str>) -> String {
        self.config.resolve_user(explicit)
    }
}
