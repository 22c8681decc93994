//! Pull: remote state into local records and blobs
//!
//! Per remote workflow the decision is driven by
//! [`ConflictDetector::classify`] over the stored base hash, the primary
//! blob hash and the remote hash:
//!
//! | Local record              | Outcome                                     |
//! |---------------------------|---------------------------------------------|
//! | none                      | created                                     |
//! | `conflict`                | pending snapshot refreshed, conflict        |
//! | blob missing              | blob rewritten, updated                     |
//! | unchanged / local only    | unchanged                                   |
//! | remote only               | blob and record overwritten, updated        |
//! | converged                 | record marked synced, updated               |
//! | both                      | pending snapshot written, conflict          |
//!
//! `force` skips every check and overwrites. Blobs are written before the
//! record so that an interrupted item is repaired by the next pull.

use std::collections::HashSet;
use std::time::Instant;

use tracing::{debug, info, warn};

use flowsync_conflict::{ConflictDetector, Divergence};
use flowsync_core::domain::{Connection, ContentHash, RemoteId, SyncStatus, Workflow, WorkflowRecord};
use flowsync_core::hasher::canonical_hash;
use flowsync_core::ports::{BlobSlot, IWorkflowGateway, ListFilter, RecordFilter};

use crate::context::SyncContext;
use crate::report::PullResult;
use crate::{ErrorCode, ItemError, ItemFault, SyncError};

/// What to pull
#[derive(Debug, Clone, Default)]
pub struct PullOptions {
    /// Only these workflows; empty means a full listing
    pub remote_ids: Vec<RemoteId>,
    /// Remote always wins
    pub force: bool,
}

impl PullOptions {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only(remote_ids: Vec<RemoteId>) -> Self {
        Self {
            remote_ids,
            force: false,
        }
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Outcome of one remote workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PullAction {
    Created,
    Updated,
    Unchanged,
    Conflict,
    DeletedRemote,
}

pub(crate) struct PullOperation<'a> {
    ctx: &'a SyncContext,
    gateway: &'a dyn IWorkflowGateway,
    connection: &'a Connection,
    force: bool,
}

impl<'a> PullOperation<'a> {
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

    /// Runs the pull
    ///
    /// # Errors
    /// Only a failed listing or a failed read of local records aborts the
    /// pull; everything else is collected per item.
    pub(crate) async fn run(&self, remote_ids: &[RemoteId]) -> Result<PullResult, SyncError> {
        let start = Instant::now();
        let mut result = PullResult::default();

        if remote_ids.is_empty() {
            self.pull_all(&mut result).await?;
        } else {
            for remote_id in remote_ids {
                let outcome = match self.gateway.get(remote_id).await {
                    Ok(workflow) => self.apply(remote_id, &workflow).await,
                    Err(e) if e.is_not_found() => self.vanished(remote_id).await,
                    Err(e) => Err(e.into()),
                };
                record_outcome(&mut result, remote_id.as_str(), outcome);
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            connection = %self.connection.name(),
            created = result.created,
            updated = result.updated,
            unchanged = result.unchanged,
            conflicts = result.conflicts,
            deleted_remote = result.deleted_remote,
            errors = result.errors.len(),
            duration_ms = result.duration_ms,
            "Pull complete"
        );
        Ok(result)
    }

    async fn pull_all(&self, result: &mut PullResult) -> Result<(), SyncError> {
        let listing = self.gateway.list(&ListFilter::new()).await?;

        // Rejected items still exist remotely
        let mut seen: HashSet<String> = listing
            .rejected
            .iter()
            .filter_map(|r| r.remote_id.clone())
            .collect();

        for rejected in &listing.rejected {
            let item_id = rejected.remote_id.as_deref().unwrap_or("<unknown>");
            warn!(item_id, reason = %rejected.reason, "Skipping invalid remote workflow");
            result.errors.push(ItemError::new(
                item_id,
                ErrorCode::Validation,
                rejected.reason.clone(),
            ));
        }

        for workflow in &listing.workflows {
            let Some(remote_id) = workflow.id.clone() else {
                warn!(name = %workflow.name, "Skipping listed workflow without an id");
                result.errors.push(ItemError::new(
                    "<unknown>",
                    ErrorCode::Validation,
                    format!("listed workflow '{}' has no id", workflow.name),
                ));
                continue;
            };
            seen.insert(remote_id.as_str().to_string());
            let outcome = self.apply(&remote_id, workflow).await;
            record_outcome(result, remote_id.as_str(), outcome);
        }

        // Synced records the listing no longer mentions
        let synced = self
            .ctx
            .records()
            .list_records(
                &self.connection.id(),
                &RecordFilter::new().with_status(SyncStatus::Synced),
            )
            .await?;
        for record in synced {
            let Some(ref remote_id) = record.remote_id else {
                continue;
            };
            if seen.contains(remote_id.as_str()) {
                continue;
            }
            let item_id = record.item_id();
            let outcome = self.mark_deleted(record).await;
            record_outcome(result, &item_id, outcome);
        }

        Ok(())
    }

    /// Handles a `NotFound` from a targeted get
    async fn vanished(&self, remote_id: &RemoteId) -> Result<PullAction, ItemFault> {
        let record = self
            .ctx
            .records()
            .get_record_by_remote_id(&self.connection.id(), remote_id)
            .await?;
        match record {
            Some(record) if record.status == SyncStatus::Synced => self.mark_deleted(record).await,
            _ => Err(ItemFault::Missing(format!(
                "workflow {remote_id} does not exist remotely"
            ))),
        }
    }

    async fn mark_deleted(&self, mut record: WorkflowRecord) -> Result<PullAction, ItemFault> {
        record.mark_deleted_remote();
        self.ctx.records().save_record(&record).await?;
        info!(item_id = %record.item_id(), name = %record.name, "Workflow deleted remotely");
        Ok(PullAction::DeletedRemote)
    }

    /// Reconciles one remote workflow
    async fn apply(&self, remote_id: &RemoteId, remote: &Workflow) -> Result<PullAction, ItemFault> {
        let remote_hash = canonical_hash(remote)?;
        let existing = self
            .ctx
            .records()
            .get_record_by_remote_id(&self.connection.id(), remote_id)
            .await?;

        let Some(mut record) = existing else {
            let record = WorkflowRecord::from_remote(
                self.connection.id(),
                remote_id.clone(),
                remote.name.clone(),
                remote.active,
                remote_hash,
                remote.updated_at,
            );
            self.ctx
                .write_slot(&SyncContext::blob_key(&record), BlobSlot::Primary, remote)
                .await?;
            self.ctx.records().save_record(&record).await?;
            debug!(remote_id = %remote_id, name = %record.name, "Created local record");
            return Ok(PullAction::Created);
        };

        if self.force {
            self.overwrite(&mut record, remote, remote_hash).await?;
            return Ok(PullAction::Updated);
        }

        if record.is_conflicted() {
            self.hold_conflict(&mut record, remote).await?;
            return Ok(PullAction::Conflict);
        }

        let Some(base) = record.content_hash.clone() else {
            self.overwrite(&mut record, remote, remote_hash).await?;
            return Ok(PullAction::Updated);
        };

        let Some(local) = self.ctx.read_local(&record).await? else {
            // Metadata without a blob; nothing local to lose
            debug!(remote_id = %remote_id, "Primary blob missing, restoring");
            self.overwrite(&mut record, remote, remote_hash).await?;
            return Ok(PullAction::Updated);
        };

        match ConflictDetector::classify(&base, &local.hash, &remote_hash) {
            Divergence::Unchanged if record.status == SyncStatus::Synced => {
                Ok(PullAction::Unchanged)
            }
            Divergence::LocalOnly => Ok(PullAction::Unchanged),
            Divergence::Unchanged | Divergence::RemoteOnly => {
                self.overwrite(&mut record, remote, remote_hash).await?;
                Ok(PullAction::Updated)
            }
            Divergence::Converged => {
                record.mark_synced(
                    remote.name.clone(),
                    remote.active,
                    remote_hash,
                    remote.updated_at,
                );
                self.ctx.records().save_record(&record).await?;
                self.ctx.clear_pending(&record).await?;
                Ok(PullAction::Updated)
            }
            Divergence::Both => {
                self.hold_conflict(&mut record, remote).await?;
                Ok(PullAction::Conflict)
            }
        }
    }

    /// Remote wins: blob first, then the record
    async fn overwrite(
        &self,
        record: &mut WorkflowRecord,
        remote: &Workflow,
        remote_hash: ContentHash,
    ) -> Result<(), ItemFault> {
        self.ctx
            .write_slot(&SyncContext::blob_key(record), BlobSlot::Primary, remote)
            .await?;
        record.mark_synced(
            remote.name.clone(),
            remote.active,
            remote_hash,
            remote.updated_at,
        );
        self.ctx.records().save_record(record).await?;
        self.ctx.clear_pending(record).await?;
        debug!(item_id = %record.item_id(), "Overwrote local copy from remote");
        Ok(())
    }

    /// Keeps the primary blob, stores the remote next to it
    async fn hold_conflict(
        &self,
        record: &mut WorkflowRecord,
        remote: &Workflow,
    ) -> Result<(), ItemFault> {
        self.ctx
            .write_slot(
                &SyncContext::blob_key(record),
                BlobSlot::PendingRemote,
                remote,
            )
            .await?;
        record.mark_conflict(remote.updated_at);
        self.ctx.records().save_record(record).await?;
        warn!(item_id = %record.item_id(), name = %record.name, "Conflict detected on pull");
        Ok(())
    }
}

fn record_outcome(
    result: &mut PullResult,
    item_id: &str,
    outcome: Result<PullAction, ItemFault>,
) {
    match outcome {
        Ok(PullAction::Created) => result.created += 1,
        Ok(PullAction::Updated) => result.updated += 1,
        Ok(PullAction::Unchanged) => result.unchanged += 1,
        Ok(PullAction::Conflict) => result.conflicts += 1,
        Ok(PullAction::DeletedRemote) => result.deleted_remote += 1,
        Err(fault) => {
            let error = fault.into_item_error(item_id);
            warn!(item_id, code = %error.code, error = %error.message, "Pull failed for workflow");
            result.errors.push(error);
        }
    }
}
