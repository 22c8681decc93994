//! CLI subcommands
//!
//! Every command opens the engine the same way through [`open_engine`].

pub mod conflicts;
pub mod connection;
pub mod diff;
pub mod history;
pub mod stage;
pub mod status;
pub mod sync;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use flowsync_cache::{DatabasePool, FsBlobStore, SqliteRecordStore};
use flowsync_core::config::Config;
use flowsync_core::domain::Connection;
use flowsync_remote::HttpGatewayProvider;
use flowsync_sync::{SyncContext, SyncEngine};

/// Wires the SQLite record store, blob store and HTTP gateways into an engine
pub async fn open_engine(config: &Config) -> Result<SyncEngine> {
    if let Some(parent) = config.store.database.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let pool = DatabasePool::new(&config.store.database)
        .await
        .context("Failed to open database")?;
    let records = Arc::new(SqliteRecordStore::new(pool.pool().clone()));
    let blobs = Arc::new(FsBlobStore::new(config.store.blob_dir.clone()));
    let gateways = Arc::new(HttpGatewayProvider::from_config(&config.remote));

    debug!(
        database = %config.store.database.display(),
        blob_dir = %config.store.blob_dir.display(),
        "Opened local store"
    );

    let ctx = SyncContext::new(Arc::new(config.clone()), records, blobs);
    Ok(SyncEngine::new(ctx, gateways))
}

/// Looks a connection up by name or id
pub async fn find_connection(engine: &SyncEngine, name_or_id: &str) -> Result<Connection> {
    engine.find_connection(name_or_id).await.with_context(|| {
        format!("Unknown connection '{name_or_id}'. Run 'flowsync connection list'.")
    })
}
