//! History command - Show recent pulls, pushes and resolutions

use anyhow::Result;
use clap::Args;
use serde_json::Value;

use flowsync_core::config::Config;
use flowsync_core::domain::{HistoryAction, SyncHistoryEntry};

use super::{find_connection, open_engine};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// Connection name or id
    pub connection: String,

    /// Maximum number of entries, newest first
    #[arg(long, default_value_t = 20)]
    pub limit: u32,
}

impl HistoryCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let engine = open_engine(config).await?;
        let connection = find_connection(&engine, &self.connection).await?;

        let entries = engine.history(&connection.id(), self.limit).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "count": entries.len(),
                "entries": entries,
            }));
            return Ok(());
        }

        if entries.is_empty() {
            formatter.success("No history yet");
            return Ok(());
        }

        formatter.success(&format!("History of '{}'", connection.name()));
        for entry in &entries {
            formatter.info(&format!(
                "{}  {:<18} {}",
                entry.timestamp().format("%Y-%m-%d %H:%M:%S"),
                entry.action().to_string(),
                summarize(entry)
            ));
        }
        Ok(())
    }
}

fn summarize(entry: &SyncHistoryEntry) -> String {
    let details = entry.details();
    let count = |key: &str| details.get(key).and_then(Value::as_u64).unwrap_or(0);

    match entry.action() {
        HistoryAction::Pull => format!(
            "created {}, updated {}, conflicts {}, deleted remotely {}, errors {}",
            count("created"),
            count("updated"),
            count("conflicts"),
            count("deleted_remote"),
            count("errors")
        ),
        HistoryAction::Push => format!(
            "created {}, updated {}, conflicts {}, errors {}",
            count("created"),
            count("updated"),
            count("conflicts"),
            count("errors")
        ),
        HistoryAction::ConflictResolved => format!(
            "{} ({})",
            details.get("name").and_then(Value::as_str).unwrap_or("?"),
            details
                .get("resolution")
                .and_then(Value::as_str)
                .unwrap_or("?")
        ),
    }
}
