//! Local persistence for FlowSync
//!
//! Two stores back the sync engine. [`SqliteRecordStore`] keeps connections,
//! per-workflow records and the sync history in one SQLite file, and
//! [`FsBlobStore`] keeps the workflow documents themselves as JSON files laid
//! out by connection. Both implement the storage ports declared in
//! `flowsync-core`.
//!
//! ```no_run
//! use std::path::Path;
//! use flowsync_cache::{DatabasePool, FsBlobStore, SqliteRecordStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let data = Path::new("/var/lib/flowsync");
//! let pool = DatabasePool::new(&data.join("flowsync.db")).await?;
//! let records = SqliteRecordStore::new(pool.pool().clone());
//! let blobs = FsBlobStore::new(data.join("workflows"));
//! # Ok(())
//! # }
//! ```

pub mod blob;
pub mod pool;
pub mod store;

pub use blob::FsBlobStore;
pub use pool::DatabasePool;
pub use store::SqliteRecordStore;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cannot open database: {0}")]
    ConnectionFailed(String),

    #[error("database error: {0}")]
    QueryFailed(String),

    #[error("cannot apply schema: {0}")]
    MigrationFailed(String),

    /// A row holds a value the domain types reject
    #[error("corrupt row: {0}")]
    SerializationError(String),

    /// Unique name or remote id already taken
    #[error("{0} already exists")]
    AlreadyExists(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
