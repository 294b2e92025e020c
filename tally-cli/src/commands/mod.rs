//! CLI command implementations

pub mod apply;
pub mod config;
pub mod demo;
pub mod logs;
pub mod preview;
pub mod rules;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tally_core::config::Config;
use tally_core::services::{EntryPoint, EventSink, LoggingService};
use tally_core::TallyContext;

/// Environment variable that overrides the data directory
const DIR_ENV: &str = "TALLY_DIR";

/// Get the logging service for CLI operations
///
/// Returns None if logging is disabled or fails to initialize (it should
/// never block operations)
pub fn get_logger() -> Option<Arc<LoggingService>> {
    let tally_dir = get_tally_dir().ok()?;
    std::fs::create_dir_all(&tally_dir).ok()?;
    let config = Config::load(&tally_dir).unwrap_or_default();
    if !config.logging_enabled {
        return None;
    }
    LoggingService::new(&tally_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
        .ok()
        .map(Arc::new)
}

/// Get the tally directory from environment or default
pub fn get_tally_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".tally"))
        .context("Could not find home directory; set TALLY_DIR")
}

/// Open the tally context and resolve the active user
pub fn get_context(command: &str, user: Option<&str>) -> Result<(TallyContext, String)> {
    let tally_dir = get_tally_dir()?;

    let logger = get_logger();
    if let Some(l) = &logger {
        let _ = l.log_command(command);
    }
    let events = logger.map(|l| l as Arc<dyn EventSink>);

    let ctx = TallyContext::with_events(&tally_dir, events)
        .with_context(|| format!("Failed to open tally data in {}", tally_dir.display()))?;
    let user_id = ctx.user_id(user);
    Ok((ctx, user_id))
}
