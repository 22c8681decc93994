//! File-backed blob store (secondary/driven adapter)
//!
//! Implements [`IBlobStore`] with `tokio::fs`. Layout:
//!
//! ```text
//! <root>/<connection id>/<name>.json                  working copy
//! <root>/<connection id>/<name>.pending-remote.json   remote snapshot under conflict
//! ```
//!
//! Writes go to a temporary file next to the target and are renamed into
//! place, so readers never observe a partial document.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use flowsync_core::domain::ConnectionId;
use flowsync_core::ports::{BlobKey, BlobSlot, IBlobStore};

/// Blob store rooted at a directory
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn connection_dir(&self, connection_id: &ConnectionId) -> PathBuf {
        self.root.join(connection_id.to_string())
    }

    /// On-disk location of a blob slot
    pub fn path_for(&self, key: &BlobKey, slot: BlobSlot) -> PathBuf {
        self.connection_dir(&key.connection_id)
            .join(format!("{}{}", key.name, slot.suffix()))
    }
}

#[async_trait::async_trait]
impl IBlobStore for FsBlobStore {
    #[instrument(skip(self), fields(key = %key))]
    async fn read(&self, key: &BlobKey, slot: BlobSlot) -> anyhow::Result<Option<Vec<u8>>> {
        let path = self.path_for(key, slot);
        match tokio::fs::read(&path).await {
            Ok(data) => {
                debug!(bytes = data.len(), ?slot, "blob read");
                Ok(Some(data))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, data), fields(key = %key, bytes = data.len()))]
    async fn write(&self, key: &BlobKey, slot: BlobSlot, data: &[u8]) -> anyhow::Result<()> {
        let target = self.path_for(key, slot);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = {
            let mut p = target.as_os_str().to_owned();
            p.push(".tmp");
            PathBuf::from(p)
        };

        tokio::fs::write(&tmp_path, data).await?;
        tokio::fs::rename(&tmp_path, &target).await?;

        debug!(?slot, "blob written");
        Ok(())
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn remove(&self, key: &BlobKey, slot: BlobSlot) -> anyhow::Result<()> {
        match tokio::fs::remove_file(self.path_for(key, slot)).await {
            Ok(()) => {
                debug!(?slot, "blob removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn remove_connection(&self, connection_id: &ConnectionId) -> anyhow::Result<()> {
        match tokio::fs::remove_dir_all(self.connection_dir(connection_id)).await {
            Ok(()) => {
                debug!("connection blobs removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
