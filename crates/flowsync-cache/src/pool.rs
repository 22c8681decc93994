//! SQLite pool for the record store
//!
//! Both constructors apply the same connection settings (foreign keys on,
//! busy timeout) and run the schema script before returning. File databases
//! additionally use WAL journaling; an in-memory database is private to its
//! connection, so that pool is capped at one.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::CacheError;

const SCHEMA: &str = include_str!("migrations/20260110_initial.sql");
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const FILE_POOL_SIZE: u32 = 5;

/// Open, migrated SQLite pool
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens the database file at `db_path`, creating it and its directory
    ///
    /// # Errors
    ///
    /// `CacheError::ConnectionFailed` if the file cannot be opened,
    /// `CacheError::MigrationFailed` if the schema script fails.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| {
                CacheError::ConnectionFailed(format!("cannot create {}: {e}", dir.display()))
            })?;
        }

        let options = base_options(SqliteConnectOptions::new().filename(db_path))
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = Self::open(options, FILE_POOL_SIZE, &db_path.display().to_string()).await?;
        tracing::info!(path = %db_path.display(), "Opened record database");
        Ok(pool)
    }

    /// Fresh private database, used by tests
    ///
    /// # Errors
    ///
    /// Same as [`DatabasePool::new`].
    pub async fn in_memory() -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?;
        Self::open(base_options(options), 1, ":memory:").await
    }

    async fn open(
        options: SqliteConnectOptions,
        max_connections: u32,
        label: &str,
    ) -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| CacheError::ConnectionFailed(format!("{label}: {e}")))?;

        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| CacheError::MigrationFailed(format!("{label}: {e}")))?;
        tracing::debug!(database = label, "Schema is up to date");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn base_options(options: SqliteConnectOptions) -> SqliteConnectOptions {
    options.foreign_keys(true).busy_timeout(BUSY_TIMEOUT)
}
