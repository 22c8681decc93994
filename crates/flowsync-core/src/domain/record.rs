//! WorkflowRecord domain entity
//!
//! A record is the local sync metadata for one workflow. The full document
//! lives in the blob store; the record only carries what change detection
//! needs.
//!
//! ## State Machine
//!
//! ```text
//!                 stage                         push
//!   (nothing) ───────────► new_local ─────────────────────────┐
//!       │                                                     ▼
//!       │ first pull                                     ┌────────┐
//!       └───────────────────────────────────────────────►│ synced │◄──┐
//!                                                        └────────┘   │
//!              blob edited │          │ remote gone        │          │ pull / push
//!                          ▼          ▼                    │          │ (no conflict)
//!                 local_modified   deleted_remote          │          │
//!                          │                               │          │
//!                          └──── remote also changed ──► conflict ────┘
//!                                                     (resolve: forced pull/push)
//! ```
//!
//! `contentHash` only ever changes when the record (re-)enters `synced`; it is
//! the base of the three-way comparison.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{ConnectionId, ContentHash, RecordId, RemoteId};

// ============================================================================
// SyncStatus
// ============================================================================

/// Sync state of a workflow record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Local and remote agree with the stored hash
    Synced,
    /// Local blob changed since the last sync
    LocalModified,
    /// Remote changed since the last sync
    ///
    /// Part of the persisted vocabulary but never assigned by the engine:
    /// pull applies remote changes immediately, and status queries do not
    /// contact the remote. Rows carrying it are read and reported as is.
    RemoteModified,
    /// Both sides changed independently
    Conflict,
    /// Staged locally, never pushed
    NewLocal,
    /// Resource no longer exists remotely
    DeletedRemote,
}

impl SyncStatus {
    /// All statuses in display order
    pub const ALL: [SyncStatus; 6] = [
        SyncStatus::Synced,
        SyncStatus::LocalModified,
        SyncStatus::RemoteModified,
        SyncStatus::Conflict,
        SyncStatus::NewLocal,
        SyncStatus::DeletedRemote,
    ];

    /// Stable string form used in storage and output
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Synced => "synced",
            SyncStatus::LocalModified => "local_modified",
            SyncStatus::RemoteModified => "remote_modified",
            SyncStatus::Conflict => "conflict",
            SyncStatus::NewLocal => "new_local",
            SyncStatus::DeletedRemote => "deleted_remote",
        }
    }

    /// Returns true if the record has local content waiting to be pushed
    pub fn has_pending_push(&self) -> bool {
        matches!(self, SyncStatus::LocalModified | SyncStatus::NewLocal)
    }

    /// Returns true if the record needs user attention
    pub fn needs_attention(&self) -> bool {
        matches!(self, SyncStatus::Conflict | SyncStatus::DeletedRemote)
    }

    /// Effective status given what is currently on disk
    ///
    /// Stored status is authoritative except for one case: a `synced` record
    /// whose blob no longer hashes to the stored value has been edited out of
    /// band and reads as `local_modified`. Pure; callers decide whether to
    /// persist the result.
    pub fn reconcile(
        stored: SyncStatus,
        stored_hash: Option<&ContentHash>,
        current_blob_hash: Option<&ContentHash>,
    ) -> SyncStatus {
        match (stored, stored_hash, current_blob_hash) {
            (SyncStatus::Synced, Some(base), Some(current)) if base != current => {
                SyncStatus::LocalModified
            }
            (status, _, _) => status,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SyncStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::InvalidStatus(s.to_string()))
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Which side wins when a conflict is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Force-push the local blob over the remote
    KeepLocal,
    /// Force-pull the remote over the local blob
    KeepRemote,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Resolution::KeepLocal => "keep_local",
            Resolution::KeepRemote => "keep_remote",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// WorkflowRecord
// ============================================================================

/// Local sync metadata for one workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    /// Immutable local identity
    pub id: RecordId,
    /// Owning connection
    pub connection_id: ConnectionId,
    /// Remote identity; `None` until a staged record is first pushed
    pub remote_id: Option<RemoteId>,
    pub name: String,
    pub active: bool,
    /// Hash at the last moment the record was `synced`
    pub content_hash: Option<ContentHash>,
    pub local_updated_at: DateTime<Utc>,
    pub remote_updated_at: Option<DateTime<Utc>>,
    pub status: SyncStatus,
}

impl WorkflowRecord {
    /// Creates a record for a workflow first seen on the remote
    pub fn from_remote(
        connection_id: ConnectionId,
        remote_id: RemoteId,
        name: impl Into<String>,
        active: bool,
        content_hash: ContentHash,
        remote_updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: RecordId::new(),
            connection_id,
            remote_id: Some(remote_id),
            name: name.into(),
            active,
            content_hash: Some(content_hash),
            local_updated_at: Utc::now(),
            remote_updated_at,
            status: SyncStatus::Synced,
        }
    }

    /// Creates a record for a workflow staged locally, not yet on the remote
    pub fn new_local(connection_id: ConnectionId, name: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            connection_id,
            remote_id: None,
            name: name.into(),
            active: false,
            content_hash: None,
            local_updated_at: Utc::now(),
            remote_updated_at: None,
            status: SyncStatus::NewLocal,
        }
    }

    /// Blob slot holding this record's document
    ///
    /// Remote id once known, `local-<record id>` for staged records.
    pub fn blob_slot(&self) -> String {
        match &self.remote_id {
            Some(remote_id) => remote_id.as_str().to_string(),
            None => format!("local-{}", self.id),
        }
    }

    /// Label for logs and item errors
    pub fn item_id(&self) -> String {
        self.remote_id
            .as_ref()
            .map(|r| r.as_str().to_string())
            .unwrap_or_else(|| self.id.to_string())
    }

    /// Returns true if the record is in conflict
    pub fn is_conflicted(&self) -> bool {
        self.status == SyncStatus::Conflict
    }

    /// Moves the record to `synced` with a new base
    pub fn mark_synced(
        &mut self,
        name: impl Into<String>,
        active: bool,
        content_hash: ContentHash,
        remote_updated_at: Option<DateTime<Utc>>,
    ) {
        self.name = name.into();
        self.active = active;
        self.content_hash = Some(content_hash);
        self.remote_updated_at = remote_updated_at;
        self.local_updated_at = Utc::now();
        self.status = SyncStatus::Synced;
    }

    /// Moves the record to `conflict`; the base hash is kept
    pub fn mark_conflict(&mut self, remote_updated_at: Option<DateTime<Utc>>) {
        if remote_updated_at.is_some() {
            self.remote_updated_at = remote_updated_at;
        }
        self.status = SyncStatus::Conflict;
    }

    /// Marks the record as gone from the remote
    pub fn mark_deleted_remote(&mut self) {
        self.status = SyncStatus::DeletedRemote;
    }
}
