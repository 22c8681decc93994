//! Results and reports returned by the engine
//!
//! Every type here is `Serialize` so the CLI can print it as JSON as-is.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use flowsync_conflict::FieldChange;
use flowsync_core::domain::{
    ConnectionId, ContentHash, RecordId, RemoteId, SyncStatus, WorkflowRecord,
};

use crate::ItemError;

// ============================================================================
// Pull / Push
// ============================================================================

/// Outcome of a pull
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResult {
    pub created: u32,
    pub updated: u32,
    pub unchanged: u32,
    /// Records left (or put) in `conflict`; their primary blob was not touched
    pub conflicts: u32,
    pub deleted_remote: u32,
    pub errors: Vec<ItemError>,
    pub duration_ms: u64,
}

impl PullResult {
    /// Records whose local state changed because of the remote
    pub fn pulled(&self) -> u32 {
        self.created + self.updated
    }
}

/// A conflict as shown to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictInfo {
    pub workflow_id: RecordId,
    pub remote_id: Option<RemoteId>,
    pub workflow_name: String,
    /// Hash of the primary blob, if readable
    pub local_hash: Option<ContentHash>,
    /// Hash of the remote side, if known
    pub remote_hash: Option<ContentHash>,
    pub local_updated_at: DateTime<Utc>,
    pub remote_updated_at: Option<DateTime<Utc>>,
}

impl ConflictInfo {
    pub fn new(
        record: &WorkflowRecord,
        local_hash: Option<ContentHash>,
        remote_hash: Option<ContentHash>,
    ) -> Self {
        Self {
            workflow_id: record.id,
            remote_id: record.remote_id.clone(),
            workflow_name: record.name.clone(),
            local_hash,
            remote_hash,
            local_updated_at: record.local_updated_at,
            remote_updated_at: record.remote_updated_at,
        }
    }
}

/// Outcome of a push
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResult {
    /// Staged or remotely deleted workflows created on the remote
    pub created: u32,
    pub updated: u32,
    /// Selected but nothing to write
    pub unchanged: u32,
    /// Records not pushed because both sides changed
    pub conflicts: Vec<ConflictInfo>,
    pub errors: Vec<ItemError>,
    pub duration_ms: u64,
}

impl PushResult {
    pub fn pushed(&self) -> u32 {
        self.created + self.updated
    }
}

/// Outcome of a pull followed by a push
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub pull: PullResult,
    pub push: PushResult,
    pub duration_ms: u64,
}

impl SyncReport {
    pub fn pulled(&self) -> u32 {
        self.pull.pulled()
    }

    pub fn pushed(&self) -> u32 {
        self.push.pushed()
    }

    /// Records in conflict after the run
    ///
    /// The push sees every record, so records put in conflict by the pull
    /// show up again in its refused list.
    pub fn conflicts(&self) -> &[ConflictInfo] {
        &self.push.conflicts
    }

    pub fn errors(&self) -> impl Iterator<Item = &ItemError> {
        self.pull.errors.iter().chain(self.push.errors.iter())
    }
}

// ============================================================================
// Status
// ============================================================================

/// Effective state of one record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEntry {
    pub record_id: RecordId,
    pub remote_id: Option<RemoteId>,
    pub name: String,
    /// Status as persisted
    pub stored_status: SyncStatus,
    /// Status after checking the blob on disk
    pub status: SyncStatus,
    /// Metadata exists but the primary blob does not; a pull repairs it
    pub blob_missing: bool,
}

/// Per-connection status, reclassified against the blobs on disk
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub connection_id: ConnectionId,
    pub connection_name: String,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub counts: BTreeMap<SyncStatus, usize>,
    pub entries: Vec<StatusEntry>,
}

impl StatusReport {
    pub(crate) fn new(
        connection_id: ConnectionId,
        connection_name: impl Into<String>,
        last_sync_at: Option<DateTime<Utc>>,
        entries: Vec<StatusEntry>,
    ) -> Self {
        let mut counts = BTreeMap::new();
        for entry in &entries {
            *counts.entry(entry.status).or_insert(0) += 1;
        }
        Self {
            connection_id,
            connection_name: connection_name.into(),
            last_sync_at,
            counts,
            entries,
        }
    }

    pub fn count(&self, status: SyncStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    /// Entries with the given effective status
    pub fn with_status(&self, status: SyncStatus) -> impl Iterator<Item = &StatusEntry> {
        self.entries.iter().filter(move |e| e.status == status)
    }

    pub fn total(&self) -> usize {
        self.entries.len()
    }
}

// ============================================================================
// Diff
// ============================================================================

/// Field-level comparison of a record's blob with the remote
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffReport {
    pub record_id: RecordId,
    pub remote_id: Option<RemoteId>,
    pub name: String,
    /// No remote counterpart (staged, or deleted remotely)
    pub remote_missing: bool,
    pub changes: Vec<FieldChange>,
}

impl DiffReport {
    pub fn is_identical(&self) -> bool {
        !self.remote_missing && self.changes.is_empty()
    }
}
