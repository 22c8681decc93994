//! Blob store port (driven/secondary port)
//!
//! Full workflow documents are kept outside the record store. A blob is
//! addressed by its connection and a slot name (the remote id, or
//! `local-<record id>` for staged workflows), and each address has two
//! slots: the working copy and the remote snapshot captured on conflict.

use std::fmt;

use crate::domain::ConnectionId;

/// Which copy of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobSlot {
    /// The local working copy
    Primary,
    /// Remote snapshot held while a conflict is unresolved
    PendingRemote,
}

impl BlobSlot {
    /// File suffix used by file-backed stores
    pub fn suffix(&self) -> &'static str {
        match self {
            BlobSlot::Primary => ".json",
            BlobSlot::PendingRemote => ".pending-remote.json",
        }
    }
}

/// Address of a document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobKey {
    pub connection_id: ConnectionId,
    pub name: String,
}

impl BlobKey {
    pub fn new(connection_id: ConnectionId, name: impl Into<String>) -> Self {
        Self {
            connection_id,
            name: name.into(),
        }
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.connection_id, self.name)
    }
}

/// Port trait for document storage
///
/// ## Implementation Notes
///
/// - `write` must be atomic with respect to readers: a reader sees either
///   the old or the new content, never a partial file.
/// - `read` of a missing blob is `Ok(None)`, not an error.
#[async_trait::async_trait]
pub trait IBlobStore: Send + Sync {
    async fn read(&self, key: &BlobKey, slot: BlobSlot) -> anyhow::Result<Option<Vec<u8>>>;

    async fn write(&self, key: &BlobKey, slot: BlobSlot, data: &[u8]) -> anyhow::Result<()>;

    /// Removes one slot; missing blobs are not an error
    async fn remove(&self, key: &BlobKey, slot: BlobSlot) -> anyhow::Result<()>;

    /// Removes every blob of a connection
    async fn remove_connection(&self, connection_id: &ConnectionId) -> anyhow::Result<()>;
}
