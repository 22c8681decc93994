//! Status command - Display per-workflow sync status
//!
//! Status is computed against the blobs on disk, so workflows edited out of
//! band show as `local_modified` before any push.

use anyhow::Result;
use clap::Args;

use flowsync_core::config::Config;
use flowsync_core::domain::SyncStatus;
use flowsync_sync::StatusReport;

use super::{find_connection, open_engine};
use crate::output::{get_formatter, plural, print_value, truncate_id, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Connection name or id
    pub connection: String,

    /// List every workflow, not only those with pending work
    #[arg(long)]
    pub all: bool,
}

impl StatusCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let engine = open_engine(config).await?;
        let connection = find_connection(&engine, &self.connection).await?;

        let report = engine.status(&connection.id()).await?;

        if format.is_json() {
            print_value(&*formatter, &report)?;
            return Ok(());
        }

        self.print_human(&report, &*formatter);
        Ok(())
    }

    fn print_human(&self, report: &StatusReport, formatter: &dyn OutputFormatter) {
        formatter.success(&format!(
            "{}: {} workflow{}",
            report.connection_name,
            report.total(),
            plural(report.total())
        ));
        let last_sync = report
            .last_sync_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        formatter.info(&format!("Last sync: {last_sync}"));

        for (status, count) in &report.counts {
            formatter.info(&format!("{:<15} {}", status.to_string(), count));
        }

        let shown: Vec<_> = report
            .entries
            .iter()
            .filter(|e| self.all || e.status != SyncStatus::Synced || e.blob_missing)
            .collect();
        if shown.is_empty() {
            return;
        }

        formatter.info("");
        formatter.info("Record         Remote         Status          Name");
        formatter.info("-------------- -------------- --------------- ----------------");
        for entry in shown {
            let remote = entry
                .remote_id
                .as_ref()
                .map(|r| truncate_id(r.as_str(), 14))
                .unwrap_or_else(|| "-".to_string());
            let mut status = entry.status.to_string();
            if entry.blob_missing {
                status.push('*');
            }
            formatter.info(&format!(
                "{:<14} {:<14} {:<15} {}",
                truncate_id(&entry.record_id.to_string(), 14),
                remote,
                status,
                entry.name
            ));
        }

        if report.entries.iter().any(|e| e.blob_missing) {
            formatter.info("");
            formatter.warn("* local copy missing; 'flowsync pull' restores it");
        }
    }
}
