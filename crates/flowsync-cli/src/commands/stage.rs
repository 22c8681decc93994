//! Stage command - Add a workflow that does not exist remotely yet
//!
//! The document is validated and stored locally as `new_local`; the next
//! push creates it on the remote.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use flowsync_core::config::Config;
use flowsync_core::domain::Workflow;

use super::{find_connection, open_engine};
use crate::output::{get_formatter, print_value, OutputFormat};

#[derive(Debug, Args)]
pub struct StageCommand {
    /// Connection name or id
    pub connection: String,

    /// Workflow JSON document
    pub file: PathBuf,
}

impl StageCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let bytes = tokio::fs::read(&self.file)
            .await
            .with_context(|| format!("Failed to read {}", self.file.display()))?;
        let workflow = Workflow::parse(&bytes)
            .with_context(|| format!("Invalid workflow in {}", self.file.display()))?;

        let engine = open_engine(config).await?;
        let connection = find_connection(&engine, &self.connection).await?;
        let record = engine.stage_local(&connection.id(), &workflow).await?;

        if format.is_json() {
            print_value(&*formatter, &record)?;
        } else {
            formatter.success(&format!(
                "Staged '{}' for '{}'",
                record.name,
                connection.name()
            ));
            formatter.info(&format!("Record: {}", record.id));
            formatter.info(&format!(
                "Run 'flowsync push {}' to create it remotely.",
                connection.name()
            ));
        }
        Ok(())
    }
}
