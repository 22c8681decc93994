//! Conflicts command - List and resolve conflicts
//!
//! Resolution forces one side over the other for a single record:
//! `--keep local` force-pushes, `--keep remote` force-pulls.

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use tracing::info;

use flowsync_core::config::Config;
use flowsync_core::domain::{RecordId, Resolution};

use super::{find_connection, open_engine};
use crate::output::{get_formatter, plural, OutputFormat};

/// Side kept by `conflicts resolve`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeepSide {
    Local,
    Remote,
}

impl From<KeepSide> for Resolution {
    fn from(side: KeepSide) -> Self {
        match side {
            KeepSide::Local => Resolution::KeepLocal,
            KeepSide::Remote => Resolution::KeepRemote,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum ConflictsCommand {
    /// List workflows in conflict
    List {
        /// Connection name or id
        connection: String,
    },
    /// Resolve a conflict
    Resolve {
        /// Local record id
        record: String,
        /// Which side wins
        #[arg(long, value_enum)]
        keep: KeepSide,
    },
}

impl ConflictsCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        match self {
            ConflictsCommand::List { connection } => {
                self.execute_list(config, connection, format).await
            }
            ConflictsCommand::Resolve { record, keep } => {
                self.execute_resolve(config, record, *keep, format).await
            }
        }
    }

    async fn execute_list(
        &self,
        config: &Config,
        connection: &str,
        format: OutputFormat,
    ) -> Result<()> {
        let formatter = get_formatter(format);
        let engine = open_engine(config).await?;
        let connection = find_connection(&engine, connection).await?;

        let conflicts = engine.conflicts(&connection.id()).await?;
        info!(count = conflicts.len(), "Retrieved conflicts");

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "count": conflicts.len(),
                "conflicts": conflicts,
            }));
            return Ok(());
        }

        if conflicts.is_empty() {
            formatter.success("No conflicts");
            return Ok(());
        }

        formatter.success(&format!(
            "{} conflict{}",
            conflicts.len(),
            plural(conflicts.len())
        ));
        formatter.info("");
        formatter.info("Record                               Local        Remote       Name");
        formatter.info("------------------------------------ ------------ ------------ ----------------");
        for conflict in &conflicts {
            let local = conflict
                .local_hash
                .as_ref()
                .map(|h| h.short().to_string())
                .unwrap_or_else(|| "missing".to_string());
            let remote = conflict
                .remote_hash
                .as_ref()
                .map(|h| h.short().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            formatter.info(&format!(
                "{:<36} {:<12} {:<12} {}",
                conflict.workflow_id, local, remote, conflict.workflow_name
            ));
        }

        formatter.info("");
        formatter.info("Use 'flowsync diff <record>' to compare both sides.");
        formatter.info("Use 'flowsync conflicts resolve <record> --keep <local|remote>' to resolve.");
        Ok(())
    }

    async fn execute_resolve(
        &self,
        config: &Config,
        record: &str,
        keep: KeepSide,
        format: OutputFormat,
    ) -> Result<()> {
        let formatter = get_formatter(format);
        let engine = open_engine(config).await?;

        let record_id: RecordId = record
            .parse()
            .with_context(|| format!("Invalid record id '{record}'"))?;
        let resolution = Resolution::from(keep);

        let resolved = engine.resolve_conflict(&record_id, resolution).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "resolution": resolution,
                "record": resolved,
            }));
        } else {
            formatter.success(&format!(
                "Resolved '{}' ({})",
                resolved.name, resolution
            ));
        }
        Ok(())
    }
}
