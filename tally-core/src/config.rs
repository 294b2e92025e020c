//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "app": { "defaultUser": "me", "logging": true, ... }
//! }
//! ```
//! Keys this crate doesn't manage are kept as-is on save.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the configured user
pub const USER_ENV: &str = "TALLY_USER";

/// User id used when nothing else is configured
pub const FALLBACK_USER: &str = "default";

const SETTINGS_FILE: &str = "settings.json";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    app: AppSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    logging: Option<bool>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Tally configuration (simplified view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    pub default_user: Option<String>,
    pub logging_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_user: None,
            logging_enabled: true,
        }
    }
}

fn read_settings(path: &Path) -> Result<SettingsFile> {
    if !path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(serde_json::from_str(&content).unwrap_or_default())
}

impl Config {
    /// Load config from the data directory, defaults if the file is missing
    pub fn load(data_dir: &Path) -> Result<Self> {
        let raw = read_settings(&data_dir.join(SETTINGS_FILE))?;

        Ok(Self {
            default_user: raw.app.default_user.filter(|u| !u.trim().is_empty()),
            logging_enabled: raw.app.logging.unwrap_or(true),
        })
    }

    /// Save config to the data directory
    /// Preserves other settings that tally doesn't manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(data_dir)?;
        let settings_path = data_dir.join(SETTINGS_FILE);

        let mut settings = read_settings(&settings_path)?;
        settings.app.default_user = self.default_user.clone();
        settings.app.logging = Some(self.logging_enabled);

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    /// Pick the active user: explicit value, then `TALLY_USER`, then the
    /// configured default, then [`FALLBACK_USER`]
    pub fn resolve_user(&self, explicit: Option<&str>) -> String {
        let env = std::env::var(USER_ENV).ok();
        pick_user(explicit, env.as_deref(), self.default_user.as_deref())
    }
}

/// First non-blank candidate, trimmed, or [`FALLBACK_USER`]
fn pick_user(explicit: Option<&str>, env: Option<&str>, configured: Option<&str>) -> String {
    [explicit, env, configured]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|u| !u.is_empty())
        .unwrap_or(FALLBACK_USER)
        .to_string()
}
