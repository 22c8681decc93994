//! Diff command - Field-level comparison of a local workflow with its remote

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

use flowsync_conflict::{ChangeKind, FieldChange};
use flowsync_core::config::Config;
use flowsync_core::domain::RecordId;

use super::open_engine;
use crate::output::{get_formatter, plural, print_value, OutputFormat};

#[derive(Debug, Args)]
pub struct DiffCommand {
    /// Local record id
    pub record: String,
}

impl DiffCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let engine = open_engine(config).await?;

        let record_id: RecordId = self
            .record
            .parse()
            .with_context(|| format!("Invalid record id '{}'", self.record))?;
        let report = engine.diff(&record_id).await?;

        if format.is_json() {
            print_value(&*formatter, &report)?;
            return Ok(());
        }

        if report.remote_missing {
            formatter.warn(&format!("'{}' has no remote counterpart", report.name));
            return Ok(());
        }
        if report.changes.is_empty() {
            formatter.success(&format!("'{}' is identical on both sides", report.name));
            return Ok(());
        }

        formatter.success(&format!(
            "'{}': {} difference{} (local vs remote)",
            report.name,
            report.changes.len(),
            plural(report.changes.len())
        ));
        for change in &report.changes {
            formatter.info(&describe(change));
        }
        Ok(())
    }
}

fn describe(change: &FieldChange) -> String {
    match change.kind {
        ChangeKind::Added => format!("+ {} (local only)", change.path),
        ChangeKind::Removed => format!("- {} (remote only)", change.path),
        ChangeKind::Modified => format!(
            "~ {}: {} -> {}",
            change.path,
            compact(change.local_value.as_ref()),
            compact(change.remote_value.as_ref())
        ),
    }
}

/// One-line rendering, shortened for long blocks
fn compact(value: Option<&Value>) -> String {
    const MAX: usize = 60;
    let Some(value) = value else {
        return "(absent)".to_string();
    };
    let text = value.to_string();
    if text.chars().count() > MAX {
        let head: String = text.chars().take(MAX - 3).collect();
        format!("{head}...")
    } else {
        text
    }
}
