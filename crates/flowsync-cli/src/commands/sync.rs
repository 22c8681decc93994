//! Pull, push and sync commands
//!
//! Thin wrappers over the engine operations of the same name. Per-workflow
//! failures are printed after the summary; they do not abort the command.

use anyhow::{Context, Result};
use clap::Args;

use flowsync_core::config::Config;
use flowsync_core::domain::{RecordId, RemoteId};
use flowsync_sync::{ConflictInfo, ItemError, PullOptions, PushOptions};

use super::{find_connection, open_engine};
use crate::output::{
    format_duration, get_formatter, plural, print_value, OutputFormat, OutputFormatter,
};

#[derive(Debug, Args)]
pub struct PullCommand {
    /// Connection name or id
    pub connection: String,

    /// Overwrite local copies even when they have unpushed edits
    #[arg(long)]
    pub force: bool,

    /// Pull only this remote workflow (repeatable)
    #[arg(long = "id")]
    pub ids: Vec<String>,
}

impl PullCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let engine = open_engine(config).await?;
        let connection = find_connection(&engine, &self.connection).await?;

        let ids = self
            .ids
            .iter()
            .map(|id| RemoteId::new(id.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .context("Invalid remote id")?;
        let mut options = PullOptions::only(ids);
        options.force = self.force;

        let result = engine.pull(&connection.id(), &options).await?;

        if format.is_json() {
            print_value(&*formatter, &result)?;
            return Ok(());
        }

        if result.pulled() == 0 && result.deleted_remote == 0 && result.errors.is_empty() {
            formatter.success("Already up to date");
        } else {
            formatter.success(&format!(
                "Pulled from '{}' in {}",
                connection.name(),
                format_duration(result.duration_ms)
            ));
        }
        print_count(&*formatter, "Created", result.created as usize);
        print_count(&*formatter, "Updated", result.updated as usize);
        print_count(&*formatter, "Deleted remotely", result.deleted_remote as usize);
        if result.conflicts > 0 {
            formatter.warn(&format!(
                "{} conflict{}; see 'flowsync conflicts list {}'",
                result.conflicts,
                plural(result.conflicts as usize),
                connection.name()
            ));
        }
        print_errors(&*formatter, &result.errors);
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct PushCommand {
    /// Connection name or id
    pub connection: String,

    /// Overwrite the remote even when it changed, conflicts included
    #[arg(long)]
    pub force: bool,

    /// Push only this local record (repeatable)
    #[arg(long = "record")]
    pub records: Vec<String>,
}

impl PushCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let engine = open_engine(config).await?;
        let connection = find_connection(&engine, &self.connection).await?;

        let record_ids = self
            .records
            .iter()
            .map(|id| id.parse::<RecordId>())
            .collect::<Result<Vec<_>, _>>()
            .context("Invalid record id")?;
        let mut options = PushOptions::only(record_ids);
        options.force = self.force;

        let result = engine.push(&connection.id(), &options).await?;

        if format.is_json() {
            print_value(&*formatter, &result)?;
            return Ok(());
        }

        if result.pushed() == 0 && result.conflicts.is_empty() && result.errors.is_empty() {
            formatter.success("Nothing to push");
        } else {
            formatter.success(&format!(
                "Pushed to '{}' in {}",
                connection.name(),
                format_duration(result.duration_ms)
            ));
        }
        print_count(&*formatter, "Created", result.created as usize);
        print_count(&*formatter, "Updated", result.updated as usize);
        print_conflicts(&*formatter, &result.conflicts);
        print_errors(&*formatter, &result.errors);
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Connection name or id
    pub connection: String,

    /// Let the remote win on pull; use `push --force` to make local win
    #[arg(long)]
    pub force: bool,
}

impl SyncCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let engine = open_engine(config).await?;
        let connection = find_connection(&engine, &self.connection).await?;

        let report = engine.sync(&connection.id(), self.force).await?;

        if format.is_json() {
            print_value(&*formatter, &report)?;
            return Ok(());
        }

        let errors: Vec<ItemError> = report.errors().cloned().collect();
        if report.pulled() == 0
            && report.pushed() == 0
            && report.conflicts().is_empty()
            && errors.is_empty()
        {
            formatter.success("Already up to date");
        } else {
            formatter.success(&format!(
                "Sync of '{}' completed in {}",
                connection.name(),
                format_duration(report.duration_ms)
            ));
        }
        print_count(&*formatter, "Pulled", report.pulled() as usize);
        print_count(&*formatter, "Pushed", report.pushed() as usize);
        print_count(
            &*formatter,
            "Deleted remotely",
            report.pull.deleted_remote as usize,
        );
        print_conflicts(&*formatter, report.conflicts());
        print_errors(&*formatter, &errors);
        Ok(())
    }
}

fn print_count(formatter: &dyn OutputFormatter, label: &str, n: usize) {
    if n > 0 {
        formatter.info(&format!("{:<17} {} workflow{}", format!("{label}:"), n, plural(n)));
    }
}

fn print_conflicts(formatter: &dyn OutputFormatter, conflicts: &[ConflictInfo]) {
    if conflicts.is_empty() {
        return;
    }
    formatter.warn(&format!(
        "{} workflow{} in conflict (not pushed):",
        conflicts.len(),
        plural(conflicts.len())
    ));
    for conflict in conflicts {
        formatter.info(&format!(
            "  {}  {}",
            conflict.workflow_id, conflict.workflow_name
        ));
    }
}

fn print_errors(formatter: &dyn OutputFormatter, errors: &[ItemError]) {
    if errors.is_empty() {
        return;
    }
    formatter.error(&format!(
        "{} error{} occurred:",
        errors.len(),
        plural(errors.len())
    ));
    for error in errors {
        formatter.info(&format!("  - {}", error));
    }
}
