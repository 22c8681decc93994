//! Push: local edits and staged workflows into the remote
//!
//! ## Selection
//!
//! Without `force` a record is pushed when its status is `local_modified` or
//! `new_local`, or when its primary blob no longer hashes to the stored base
//! (edited out of band). Records in `conflict` are refused and reported.
//! With `force` every selected record that has a blob is written.
//!
//! ## Per record
//!
//! 1. Fetch the remote (skipped for staged records, which always create).
//! 2. Classify base/local/remote; only `LocalOnly` is written. `Both` is a
//!    conflict: the remote snapshot goes to the pending slot and nothing is
//!    sent. `RemoteOnly` is left for the next pull.
//! 3. A remote that no longer exists is re-created.
//! 4. On success the server's echo becomes the new blob and the new base.

use std::time::Instant;

use tracing::{debug, info, warn};

use flowsync_conflict::{ConflictDetector, Divergence};
use flowsync_core::domain::{Connection, RecordId, RemoteId, Workflow, WorkflowRecord};
use flowsync_core::hasher::canonical_hash;
use flowsync_core::ports::{BlobSlot, GatewayError, IWorkflowGateway, RecordFilter};

use crate::context::{LocalCopy, SyncContext};
use crate::report::{ConflictInfo, PushResult};
use crate::{ItemFault, SyncError};

/// What to push
#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    /// Only these records; empty means every record of the connection
    pub record_ids: Vec<RecordId>,
    /// Local always wins, conflicts included
    pub force: bool,
}

impl PushOptions {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only(record_ids: Vec<RecordId>) -> Self {
        Self {
            record_ids,
            force: false,
        }
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

enum PushAction {
    Created,
    Updated,
    Unchanged,
    Skipped,
    Conflict(ConflictInfo),
}

pub(crate) struct PushOperation<'a> {
    ctx: &'a SyncContext,
    gateway: &'a dyn IWorkflowGateway,
    connection: &'a Connection,
    force: bool,
}

impl<'a> PushOperation<'a> {
    pub(crate) fn new(
        ctx: &'a SyncContext,
        gateway: &'a dyn IWorkflowGateway,
        connection: &'a Connection,
        force: bool,
    ) -> Self {
        Self {
            ctx,
            gateway,
            connection,
            force,
        }
    }

    /// Runs the push
    ///
    /// # Errors
    /// Only failing to list the connection's records aborts the push.
    pub(crate) async fn run(&self, record_ids: &[RecordId]) -> Result<PushResult, SyncError> {
        let start = Instant::now();
        let mut result = PushResult::default();

        let selected = if record_ids.is_empty() {
            self.ctx
                .records()
                .list_records(&self.connection.id(), &RecordFilter::new())
                .await?
        } else {
            self.select(record_ids, &mut result).await
        };

        for record in selected {
            let item_id = record.item_id();
            match self.push_record(record).await {
                Ok(PushAction::Created) => result.created += 1,
                Ok(PushAction::Updated) => result.updated += 1,
                Ok(PushAction::Unchanged) => result.unchanged += 1,
                Ok(PushAction::Skipped) => {}
                Ok(PushAction::Conflict(info)) => result.conflicts.push(info),
                Err(fault) => {
                    let error = fault.into_item_error(&item_id);
                    warn!(
                        item_id = %item_id,
                        code = %error.code,
                        error = %error.message,
                        "Push failed for workflow"
                    );
                    result.errors.push(error);
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            connection = %self.connection.name(),
            created = result.created,
            updated = result.updated,
            unchanged = result.unchanged,
            conflicts = result.conflicts.len(),
            errors = result.errors.len(),
            duration_ms = result.duration_ms,
            "Push complete"
        );
        Ok(result)
    }

    /// Loads the requested records; unknown ids become item errors
    async fn select(&self, record_ids: &[RecordId], result: &mut PushResult) -> Vec<WorkflowRecord> {
        let mut selected = Vec::with_capacity(record_ids.len());
        for id in record_ids {
            match self.ctx.records().get_record(id).await {
                Ok(Some(record)) if record.connection_id == self.connection.id() => {
                    selected.push(record)
                }
                Ok(_) => result.errors.push(
                    ItemFault::Missing(format!(
                        "no workflow record {id} in connection {}",
                        self.connection.name()
                    ))
                    .into_item_error(id.to_string()),
                ),
                Err(e) => result
                    .errors
                    .push(ItemFault::Store(e).into_item_error(id.to_string())),
            }
        }
        selected
    }

    async fn push_record(&self, mut record: WorkflowRecord) -> Result<PushAction, ItemFault> {
        if record.is_conflicted() && !self.force {
            debug!(item_id = %record.item_id(), "Refusing to push conflicted workflow");
            return Ok(PushAction::Conflict(
                self.ctx.describe_conflict(&record).await,
            ));
        }

        let local = self.ctx.read_local(&record).await?;

        if !self.force && !is_pending(&record, local.as_ref()) {
            return Ok(PushAction::Skipped);
        }

        let Some(local) = local else {
            return Err(ItemFault::Missing(format!(
                "local document for '{}' is missing",
                record.name
            )));
        };

        let Some(remote_id) = record.remote_id.clone() else {
            return self.create(&mut record, &local.workflow).await;
        };

        if self.force {
            return self.update_or_create(&mut record, &remote_id, &local).await;
        }

        let remote = match self.gateway.get(&remote_id).await {
            Ok(remote) => remote,
            Err(e) if e.is_not_found() => {
                info!(remote_id = %remote_id, "Workflow gone remotely, re-creating");
                return self.create(&mut record, &local.workflow).await;
            }
            Err(e) => return Err(e.into()),
        };
        let remote_hash = canonical_hash(&remote)?;

        let Some(base) = record.content_hash.clone() else {
            return self.update_or_create(&mut record, &remote_id, &local).await;
        };

        match ConflictDetector::classify(&base, &local.hash, &remote_hash) {
            Divergence::LocalOnly => self.update_or_create(&mut record, &remote_id, &local).await,
            Divergence::Unchanged | Divergence::Converged => {
                // Same content on both sides; settle the record without writes
                record.mark_synced(
                    remote.name.clone(),
                    remote.active,
                    remote_hash,
                    remote.updated_at,
                );
                self.ctx.records().save_record(&record).await?;
                self.ctx.clear_pending(&record).await?;
                Ok(PushAction::Unchanged)
            }
            Divergence::RemoteOnly => {
                debug!(remote_id = %remote_id, "Only the remote changed, left for pull");
                Ok(PushAction::Unchanged)
            }
            Divergence::Both => {
                self.ctx
                    .write_slot(
                        &SyncContext::blob_key(&record),
                        BlobSlot::PendingRemote,
                        &remote,
                    )
                    .await?;
                record.mark_conflict(remote.updated_at);
                self.ctx.records().save_record(&record).await?;
                warn!(
                    remote_id = %remote_id,
                    name = %record.name,
                    local = local.hash.short(),
                    remote = remote_hash.short(),
                    "Conflict detected on push"
                );
                Ok(PushAction::Conflict(ConflictInfo::new(
                    &record,
                    Some(local.hash),
                    Some(remote_hash),
                )))
            }
        }
    }

    async fn update_or_create(
        &self,
        record: &mut WorkflowRecord,
        remote_id: &RemoteId,
        local: &LocalCopy,
    ) -> Result<PushAction, ItemFault> {
        match self.gateway.update(remote_id, &local.workflow.to_input()).await {
            Ok(echo) => {
                self.settle(record, &echo).await?;
                Ok(PushAction::Updated)
            }
            Err(GatewayError::NotFound(_)) => self.create(record, &local.workflow).await,
            Err(e) => Err(e.into()),
        }
    }

    async fn create(
        &self,
        record: &mut WorkflowRecord,
        workflow: &Workflow,
    ) -> Result<PushAction, ItemFault> {
        let echo = self.gateway.create(&workflow.to_input()).await?;
        self.settle(record, &echo).await?;
        Ok(PushAction::Created)
    }

    /// Adopts the server's echo as blob and base
    ///
    /// The remote id may change (first push of a staged record, or a
    /// re-created workflow); the blob then moves to the new slot.
    async fn settle(&self, record: &mut WorkflowRecord, echo: &Workflow) -> Result<(), ItemFault> {
        let echo_hash = canonical_hash(echo)?;
        let old_key = SyncContext::blob_key(record);

        if let Some(ref id) = echo.id {
            record.remote_id = Some(id.clone());
        }
        let new_key = SyncContext::blob_key(record);

        self.ctx
            .write_slot(&new_key, BlobSlot::Primary, echo)
            .await?;
        record.mark_synced(echo.name.clone(), echo.active, echo_hash, echo.updated_at);
        self.ctx.records().save_record(record).await?;

        if old_key != new_key {
            self.ctx.blobs().remove(&old_key, BlobSlot::Primary).await?;
            self.ctx
                .blobs()
                .remove(&old_key, BlobSlot::PendingRemote)
                .await?;
        }
        self.ctx.clear_pending(record).await?;

        debug!(item_id = %record.item_id(), name = %record.name, "Pushed workflow");
        Ok(())
    }
}

/// Push selection without `force`
fn is_pending(record: &WorkflowRecord, local: Option<&LocalCopy>) -> bool {
    if record.status.has_pending_push() {
        return true;
    }
    match (record.content_hash.as_ref(), local) {
        (Some(base), Some(local)) => &local.hash != base,
        _ => false,
    }
}
