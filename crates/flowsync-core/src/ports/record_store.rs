//! Record store port (driven/secondary port)
//!
//! Persists connections, workflow records and the history log.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific and
//!   the engine treats them all as store failures.
//! - Deleting a connection cascades to its records and history.

use chrono::{DateTime, Utc};

use crate::domain::{
    Connection, ConnectionId, RecordId, RemoteId, SyncHistoryEntry, SyncStatus, WorkflowRecord,
};

/// Filter criteria for listing records
///
/// `None` fields do not filter. Fields combine with AND.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub status: Option<SyncStatus>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: SyncStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Port trait for sync metadata persistence
#[async_trait::async_trait]
pub trait IRecordStore: Send + Sync {
    // --- Connections ---

    /// Inserts a connection; names are unique
    async fn add_connection(&self, connection: &Connection) -> anyhow::Result<()>;

    async fn get_connection(&self, id: &ConnectionId) -> anyhow::Result<Option<Connection>>;

    async fn get_connection_by_name(&self, name: &str) -> anyhow::Result<Option<Connection>>;

    async fn list_connections(&self) -> anyhow::Result<Vec<Connection>>;

    /// Deletes a connection with its records and history
    ///
    /// Returns false if it did not exist.
    async fn remove_connection(&self, id: &ConnectionId) -> anyhow::Result<bool>;

    async fn touch_last_sync(&self, id: &ConnectionId, at: DateTime<Utc>) -> anyhow::Result<()>;

    // --- Workflow records ---

    /// Inserts or replaces a record by its local id
    async fn save_record(&self, record: &WorkflowRecord) -> anyhow::Result<()>;

    async fn get_record(&self, id: &RecordId) -> anyhow::Result<Option<WorkflowRecord>>;

    async fn get_record_by_remote_id(
        &self,
        connection_id: &ConnectionId,
        remote_id: &RemoteId,
    ) -> anyhow::Result<Option<WorkflowRecord>>;

    async fn list_records(
        &self,
        connection_id: &ConnectionId,
        filter: &RecordFilter,
    ) -> anyhow::Result<Vec<WorkflowRecord>>;

    // --- History ---

    /// Appends an entry and returns its assigned id
    async fn append_history(&self, entry: &SyncHistoryEntry) -> anyhow::Result<i64>;

    /// Newest first
    async fn list_history(
        &self,
        connection_id: &ConnectionId,
        limit: u32,
    ) -> anyhow::Result<Vec<SyncHistoryEntry>>;
}
