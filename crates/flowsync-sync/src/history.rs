//! HistoryLogger - writes the sync history log
//!
//! Wraps `IRecordStore::append_history()` with one method per action.
//! Persistence failures are logged via `tracing::warn!` and never
//! propagated: a lost history line must not fail a pull or a push.

use std::sync::Arc;

use serde_json::json;

use flowsync_core::domain::{
    ConnectionId, HistoryAction, Resolution, SyncHistoryEntry, WorkflowRecord,
};
use flowsync_core::ports::IRecordStore;

use crate::report::{PullResult, PushResult};

/// History log writer
pub struct HistoryLogger {
    records: Arc<dyn IRecordStore>,
}

impl HistoryLogger {
    pub fn new(records: Arc<dyn IRecordStore>) -> Self {
        Self { records }
    }

    async fn append(&self, entry: &SyncHistoryEntry) {
        if let Err(e) = self.records.append_history(entry).await {
            tracing::warn!(
                action = %entry.action(),
                error = %e,
                "Failed to save history entry"
            );
        }
    }

    /// Aggregate counts of a pull
    pub async fn pull(&self, connection_id: ConnectionId, result: &PullResult) {
        let entry = SyncHistoryEntry::new(connection_id, HistoryAction::Pull).with_details(json!({
            "created": result.created,
            "updated": result.updated,
            "unchanged": result.unchanged,
            "conflicts": result.conflicts,
            "deleted_remote": result.deleted_remote,
            "errors": result.errors.len(),
            "duration_ms": result.duration_ms,
        }));
        self.append(&entry).await;
    }

    /// Aggregate counts of a push
    pub async fn push(&self, connection_id: ConnectionId, result: &PushResult) {
        let entry = SyncHistoryEntry::new(connection_id, HistoryAction::Push).with_details(json!({
            "created": result.created,
            "updated": result.updated,
            "unchanged": result.unchanged,
            "conflicts": result.conflicts.len(),
            "errors": result.errors.len(),
            "duration_ms": result.duration_ms,
        }));
        self.append(&entry).await;
    }

    /// A resolved conflict, tied to its record
    pub async fn conflict_resolved(&self, record: &WorkflowRecord, resolution: Resolution) {
        let entry = SyncHistoryEntry::new(record.connection_id, HistoryAction::ConflictResolved)
            .with_record_id(record.id)
            .with_details(json!({
                "resolution": resolution.to_string(),
                "remote_id": record.remote_id.as_ref().map(|r| r.as_str()),
                "name": record.name,
            }));
        self.append(&entry).await;
    }
}
