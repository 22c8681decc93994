//! Connection command - Manage remote connections
//!
//! A connection is one remote workflow service. The API key is never stored;
//! `--api-key-env` names the environment variable that holds it.

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use flowsync_core::config::Config;
use flowsync_core::domain::Connection;

use super::{find_connection, open_engine};
use crate::output::{get_formatter, plural, print_value, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConnectionCommand {
    /// Register a remote service
    Add {
        /// Unique local name
        name: String,
        /// Base URL of the service API, e.g. https://host/api/v1
        url: String,
        /// Environment variable holding the API key
        #[arg(long)]
        api_key_env: Option<String>,
    },
    /// List registered connections
    List,
    /// Remove a connection with all its local records and blobs
    Remove {
        /// Connection name or id
        connection: String,
    },
}

impl ConnectionCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        match self {
            ConnectionCommand::Add {
                name,
                url,
                api_key_env,
            } => self.execute_add(config, name, url, api_key_env.as_deref(), format).await,
            ConnectionCommand::List => self.execute_list(config, format).await,
            ConnectionCommand::Remove { connection } => {
                self.execute_remove(config, connection, format).await
            }
        }
    }

    async fn execute_add(
        &self,
        config: &Config,
        name: &str,
        url: &str,
        api_key_env: Option<&str>,
        format: OutputFormat,
    ) -> Result<()> {
        let formatter = get_formatter(format);
        let engine = open_engine(config).await?;

        let mut connection = Connection::new(name, url).context("Invalid connection")?;
        if let Some(var) = api_key_env {
            connection = connection.with_api_key_env(var);
        }
        engine
            .add_connection(&connection)
            .await
            .with_context(|| format!("Failed to add connection '{name}'"))?;

        info!(name = %name, id = %connection.id(), "Connection added");

        if format.is_json() {
            print_value(&*formatter, &connection)?;
        } else {
            formatter.success(&format!("Added connection '{}'", connection.name()));
            formatter.info(&format!("ID:  {}", connection.id()));
            formatter.info(&format!("URL: {}", connection.base_url()));
            if let Some(var) = connection.api_key_env() {
                formatter.info(&format!("Key: ${var}"));
            }
        }
        Ok(())
    }

    async fn execute_list(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let engine = open_engine(config).await?;
        let connections = engine.connections().await?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "count": connections.len(),
                "connections": connections,
            }));
            return Ok(());
        }

        if connections.is_empty() {
            formatter.success("No connections. Add one with 'flowsync connection add'.");
            return Ok(());
        }

        formatter.success(&format!(
            "{} connection{}",
            connections.len(),
            plural(connections.len())
        ));
        for connection in &connections {
            let last_sync = connection
                .last_sync_at()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "never".to_string());
            formatter.info(&format!(
                "{:<16} {:<40} last sync: {}",
                connection.name(),
                connection.base_url(),
                last_sync
            ));
        }
        Ok(())
    }

    async fn execute_remove(
        &self,
        config: &Config,
        name_or_id: &str,
        format: OutputFormat,
    ) -> Result<()> {
        let formatter = get_formatter(format);
        let engine = open_engine(config).await?;
        let connection = find_connection(&engine, name_or_id).await?;

        engine.remove_connection(&connection.id()).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "removed": connection.id().to_string(),
            }));
        } else {
            formatter.success(&format!("Removed connection '{}'", connection.name()));
        }
        Ok(())
    }
}
