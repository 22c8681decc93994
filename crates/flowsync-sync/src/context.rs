//! Explicit operation context
//!
//! Every engine call receives its configuration and store handles through a
//! [`SyncContext`]; nothing is looked up from global state.

use std::sync::Arc;

use tracing::{debug, warn};

use flowsync_core::config::Config;
use flowsync_core::domain::{Connection, ConnectionId, ContentHash, Workflow, WorkflowRecord};
use flowsync_core::hasher::canonical_hash;
use flowsync_core::ports::{BlobKey, BlobSlot, IBlobStore, IRecordStore};

use crate::report::ConflictInfo;
use crate::{ItemFault, SyncError};

/// Configuration plus the two local stores
#[derive(Clone)]
pub struct SyncContext {
    config: Arc<Config>,
    records: Arc<dyn IRecordStore>,
    blobs: Arc<dyn IBlobStore>,
}

/// A parsed and hashed working copy
pub(crate) struct LocalCopy {
    pub workflow: Workflow,
    pub hash: ContentHash,
}

/// What a blob slot currently holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SlotState {
    Missing,
    /// Present but not JSON, or unreadable
    Unhashable,
    Hashed(ContentHash),
}

impl SlotState {
    pub(crate) fn into_hash(self) -> Option<ContentHash> {
        match self {
            SlotState::Hashed(hash) => Some(hash),
            SlotState::Missing | SlotState::Unhashable => None,
        }
    }
}

impl SyncContext {
    pub fn new(
        config: Arc<Config>,
        records: Arc<dyn IRecordStore>,
        blobs: Arc<dyn IBlobStore>,
    ) -> Self {
        Self {
            config,
            records,
            blobs,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn records(&self) -> &Arc<dyn IRecordStore> {
        &self.records
    }

    pub fn blobs(&self) -> &Arc<dyn IBlobStore> {
        &self.blobs
    }

    /// Loads a connection or fails the whole operation
    pub(crate) async fn connection(&self, id: &ConnectionId) -> Result<Connection, SyncError> {
        self.records
            .get_connection(id)
            .await?
            .ok_or_else(|| SyncError::ConnectionNotFound(id.to_string()))
    }

    pub(crate) fn blob_key(record: &WorkflowRecord) -> BlobKey {
        BlobKey::new(record.connection_id, record.blob_slot())
    }

    // ------------------------------------------------------------------------
    // Blob access for item handlers
    // ------------------------------------------------------------------------

    /// Reads, validates and hashes the primary blob
    ///
    /// `Ok(None)` when the blob does not exist. A blob that is not a valid
    /// workflow is a validation fault.
    pub(crate) async fn read_local(
        &self,
        record: &WorkflowRecord,
    ) -> Result<Option<LocalCopy>, ItemFault> {
        let key = Self::blob_key(record);
        let Some(bytes) = self.blobs.read(&key, BlobSlot::Primary).await? else {
            return Ok(None);
        };
        let workflow = Workflow::parse(&bytes)
            .map_err(|e| ItemFault::Validation(format!("local document {key}: {e}")))?;
        let hash = canonical_hash(&workflow)?;
        Ok(Some(LocalCopy { workflow, hash }))
    }

    pub(crate) async fn write_slot(
        &self,
        key: &BlobKey,
        slot: BlobSlot,
        workflow: &Workflow,
    ) -> Result<(), ItemFault> {
        let bytes = workflow.to_blob()?;
        self.blobs.write(key, slot, &bytes).await?;
        Ok(())
    }

    /// Drops the remote snapshot kept for a conflict, if any
    pub(crate) async fn clear_pending(&self, record: &WorkflowRecord) -> Result<(), ItemFault> {
        self.blobs
            .remove(&Self::blob_key(record), BlobSlot::PendingRemote)
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Lenient reads for queries
    // ------------------------------------------------------------------------

    /// State of a slot for read-only queries
    ///
    /// Never fails: read errors and documents that are not valid workflows
    /// are reported as unhashable. Hashing matches [`Self::read_local`].
    pub(crate) async fn slot_state(&self, record: &WorkflowRecord, slot: BlobSlot) -> SlotState {
        let key = Self::blob_key(record);
        let bytes = match self.blobs.read(&key, slot).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return SlotState::Missing,
            Err(e) => {
                warn!(key = %key, ?slot, error = %e, "Failed to read blob");
                return SlotState::Unhashable;
            }
        };
        match Workflow::parse(&bytes).and_then(|workflow| canonical_hash(&workflow)) {
            Ok(hash) => SlotState::Hashed(hash),
            Err(e) => {
                debug!(key = %key, ?slot, error = %e, "Blob is not hashable");
                SlotState::Unhashable
            }
        }
    }

    /// Conflict summary built from both blob slots
    pub(crate) async fn describe_conflict(&self, record: &WorkflowRecord) -> ConflictInfo {
        let local = self.slot_state(record, BlobSlot::Primary).await.into_hash();
        let remote = self
            .slot_state(record, BlobSlot::PendingRemote)
            .await
            .into_hash();
        ConflictInfo::new(record, local, remote)
    }
}
