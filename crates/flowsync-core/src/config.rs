//! YAML configuration
//!
//! Every section and key is optional; anything missing takes its default.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Top-level configuration for FlowSync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub remote: RemoteConfig,
    pub logging: LoggingConfig,
}

/// Local persistence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database holding connections, records and history.
    pub database: PathBuf,
    /// Directory holding the workflow documents.
    pub blob_dir: PathBuf,
}

/// Remote service settings, shared by every connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Items requested per listing page.
    pub page_size: u32,
    /// Header carrying the API key.
    pub api_key_header: String,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Config {
    /// Reads and parses the YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("cannot parse {}", path.display()))
    }

    /// Like [`Config::load`], but a missing or broken file yields the defaults.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// `<config dir>/flowsync/config.yaml`
    pub fn default_path() -> PathBuf {
        base_dir(dirs::config_dir(), "~/.config").join("config.yaml")
    }
}

fn base_dir(platform: Option<PathBuf>, fallback: &str) -> PathBuf {
    platform
        .unwrap_or_else(|| PathBuf::from(fallback))
        .join("flowsync")
}

impl Default for StoreConfig {
    fn default() -> Self {
        let data = base_dir(dirs::data_dir(), "~/.local/share");
        Self {
            database: data.join("flowsync.db"),
            blob_dir: data.join("workflows"),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            page_size: 100,
            api_key_header: "X-API-KEY".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// One problem found by [`Config::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted key, e.g. `remote.page_size`
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Largest page the listing endpoint serves
const MAX_PAGE_SIZE: u32 = 250;

impl Config {
    /// Returns every problem at once; empty means usable.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut problems = Vec::new();
        let mut require = |ok: bool, field: &str, message: String| {
            if !ok {
                problems.push(ValidationError {
                    field: field.to_string(),
                    message,
                });
            }
        };
        let non_empty = || "must not be empty".to_string();

        require(
            !self.store.database.as_os_str().is_empty(),
            "store.database",
            non_empty(),
        );
        require(
            !self.store.blob_dir.as_os_str().is_empty(),
            "store.blob_dir",
            non_empty(),
        );
        require(
            self.remote.timeout_secs > 0,
            "remote.timeout_secs",
            "must be greater than 0".to_string(),
        );
        require(
            (1..=MAX_PAGE_SIZE).contains(&self.remote.page_size),
            "remote.page_size",
            format!("must be between 1 and {MAX_PAGE_SIZE}"),
        );
        require(
            !self.remote.api_key_header.trim().is_empty(),
            "remote.api_key_header",
            non_empty(),
        );
        require(
            LOG_LEVELS.contains(&self.logging.level.as_str()),
            "logging.level",
            format!(
                "unknown level '{}' (use {})",
                self.logging.level,
                LOG_LEVELS.join("/")
            ),
        );

        problems
    }
}
