//! Output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use serde::Serialize;

use tally_core::domain::result::Result as CoreResult;
use tally_core::OperationResult;

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Print a core result as an `OperationResult` JSON envelope
///
/// Exits with code 1 when the operation failed.
pub fn print_json<T: Serialize>(result: CoreResult<T>) -> anyhow::Result<()> {
    let failed = result.is_err();
    let envelope: OperationResult<T> = result.into();
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Shorten text for table cells
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", kept)
}
