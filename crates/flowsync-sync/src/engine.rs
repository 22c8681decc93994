//! Sync orchestrator
//!
//! The [`SyncEngine`] is the only entry point callers use. It resolves the
//! connection and its gateway once per call, delegates to the pull and push
//! operations, writes the history log, and answers read-only queries.
//!
//! ## Sync Flow
//!
//! 1. **Pull**: remote changes into records and blobs (conflicts held aside)
//! 2. **Push**: local edits and staged workflows out to the remote
//! 3. **Bookkeeping**: history entries, `last_sync_at`
//!
//! Operations on one connection run item by item. Running two engines
//! against the same stores at once is not supported.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use flowsync_conflict::diff_workflows;
use flowsync_core::domain::{
    Connection, ConnectionId, RecordId, Resolution, SyncHistoryEntry, SyncStatus, Workflow,
    WorkflowRecord,
};
use flowsync_core::ports::{
    BlobSlot, IGatewayProvider, IWorkflowGateway, RecordFilter,
};

use crate::context::{SlotState, SyncContext};
use crate::history::HistoryLogger;
use crate::pull::{PullOperation, PullOptions};
use crate::push::{PushOperation, PushOptions};
use crate::report::{
    ConflictInfo, DiffReport, PullResult, PushResult, StatusEntry, StatusReport, SyncReport,
};
use crate::SyncError;

/// Bidirectional workflow synchronization engine
///
/// ## Dependencies
///
/// - `ctx`: configuration, record store and blob store
/// - `gateways`: builds a remote gateway for a connection
pub struct SyncEngine {
    ctx: SyncContext,
    gateways: Arc<dyn IGatewayProvider>,
    history: HistoryLogger,
}

impl SyncEngine {
    pub fn new(ctx: SyncContext, gateways: Arc<dyn IGatewayProvider>) -> Self {
        let history = HistoryLogger::new(Arc::clone(ctx.records()));
        Self {
            ctx,
            gateways,
            history,
        }
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    fn gateway(&self, connection: &Connection) -> Result<Arc<dyn IWorkflowGateway>, SyncError> {
        Ok(self.gateways.gateway_for(connection)?)
    }

    async fn record(&self, id: &RecordId) -> Result<WorkflowRecord, SyncError> {
        self.ctx
            .records()
            .get_record(id)
            .await?
            .ok_or_else(|| SyncError::RecordNotFound(id.to_string()))
    }

    // ========================================================================
    // Connections
    // ========================================================================

    /// Registers a remote endpoint
    ///
    /// # Errors
    /// Fails if the name is already taken.
    pub async fn add_connection(&self, connection: &Connection) -> Result<(), SyncError> {
        self.ctx.records().add_connection(connection).await?;
        info!(connection = %connection.name(), url = %connection.base_url(), "Connection added");
        Ok(())
    }

    pub async fn connections(&self) -> Result<Vec<Connection>, SyncError> {
        Ok(self.ctx.records().list_connections().await?)
    }

    /// Looks a connection up by name, then by id
    pub async fn find_connection(&self, name_or_id: &str) -> Result<Connection, SyncError> {
        if let Some(conn) = self.ctx.records().get_connection_by_name(name_or_id).await? {
            return Ok(conn);
        }
        if let Ok(id) = name_or_id.parse::<ConnectionId>() {
            if let Some(conn) = self.ctx.records().get_connection(&id).await? {
                return Ok(conn);
            }
        }
        Err(SyncError::ConnectionNotFound(name_or_id.to_string()))
    }

    /// Removes a connection with its records, history and blobs
    pub async fn remove_connection(&self, id: &ConnectionId) -> Result<(), SyncError> {
        let connection = self.ctx.connection(id).await?;
        self.ctx.records().remove_connection(id).await?;
        self.ctx.blobs().remove_connection(id).await?;
        info!(connection = %connection.name(), "Connection removed");
        Ok(())
    }

    // ========================================================================
    // Pull / Push / Sync
    // ========================================================================

    /// Reconciles remote state into local state
    ///
    /// # Errors
    /// Fails before touching any item if the connection is unknown, its
    /// gateway cannot be built, or the listing fails. Per-workflow failures
    /// are returned in [`PullResult::errors`].
    #[tracing::instrument(skip(self, options), fields(force = options.force))]
    pub async fn pull(
        &self,
        connection_id: &ConnectionId,
        options: &PullOptions,
    ) -> Result<PullResult, SyncError> {
        let connection = self.ctx.connection(connection_id).await?;
        let gateway = self.gateway(&connection)?;

        let result = PullOperation::new(&self.ctx, gateway.as_ref(), &connection, options.force)
            .run(&options.remote_ids)
            .await?;

        self.history.pull(connection.id(), &result).await;
        self.ctx
            .records()
            .touch_last_sync(&connection.id(), Utc::now())
            .await?;
        Ok(result)
    }

    /// Reconciles local state into remote state
    ///
    /// # Errors
    /// Same operation-level failures as [`SyncEngine::pull`].
    #[tracing::instrument(skip(self, options), fields(force = options.force))]
    pub async fn push(
        &self,
        connection_id: &ConnectionId,
        options: &PushOptions,
    ) -> Result<PushResult, SyncError> {
        let connection = self.ctx.connection(connection_id).await?;
        let gateway = self.gateway(&connection)?;

        let result = PushOperation::new(&self.ctx, gateway.as_ref(), &connection, options.force)
            .run(&options.record_ids)
            .await?;

        self.history.push(connection.id(), &result).await;
        Ok(result)
    }

    /// Pull, then push, over every workflow of the connection
    ///
    /// `force` applies to the pull only: the remote wins, and the push that
    /// follows writes just what is still pending (staged creates). Forcing
    /// local over remote is `push` with [`PushOptions::force`].
    #[tracing::instrument(skip(self))]
    pub async fn sync(
        &self,
        connection_id: &ConnectionId,
        force: bool,
    ) -> Result<SyncReport, SyncError> {
        let start = Instant::now();

        let mut pull_options = PullOptions::all();
        pull_options.force = force;
        let pull = self.pull(connection_id, &pull_options).await?;

        let push = self.push(connection_id, &PushOptions::all()).await?;

        let report = SyncReport {
            pull,
            push,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            pulled = report.pulled(),
            pushed = report.pushed(),
            conflicts = report.conflicts().len(),
            errors = report.errors().count(),
            duration_ms = report.duration_ms,
            "Sync complete"
        );
        Ok(report)
    }

    // ========================================================================
    // Local staging
    // ========================================================================

    /// Stages a workflow that does not exist remotely yet
    ///
    /// The blob is stored under `local-<record id>` until the first push.
    #[tracing::instrument(skip(self, workflow), fields(name = %workflow.name))]
    pub async fn stage_local(
        &self,
        connection_id: &ConnectionId,
        workflow: &Workflow,
    ) -> Result<WorkflowRecord, SyncError> {
        workflow.validate()?;
        let connection = self.ctx.connection(connection_id).await?;

        let mut record = WorkflowRecord::new_local(connection.id(), workflow.name.clone());
        record.active = workflow.active;

        let bytes = workflow.to_blob()?;
        self.ctx
            .blobs()
            .write(&SyncContext::blob_key(&record), BlobSlot::Primary, &bytes)
            .await?;
        self.ctx.records().save_record(&record).await?;

        info!(record_id = %record.id, "Workflow staged for creation");
        Ok(record)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Per-record status, reclassified against the blobs on disk
    ///
    /// Read-only: a drifted status is reported, not persisted.
    pub async fn status(&self, connection_id: &ConnectionId) -> Result<StatusReport, SyncError> {
        let connection = self.ctx.connection(connection_id).await?;
        let records = self
            .ctx
            .records()
            .list_records(connection_id, &RecordFilter::new())
            .await?;

        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let state = self.ctx.slot_state(&record, BlobSlot::Primary).await;
            let blob_missing = state == SlotState::Missing;
            let status = match state {
                SlotState::Hashed(ref current) => SyncStatus::reconcile(
                    record.status,
                    record.content_hash.as_ref(),
                    Some(current),
                ),
                // A document that no longer parses was edited by hand
                SlotState::Unhashable if record.status == SyncStatus::Synced => {
                    SyncStatus::LocalModified
                }
                _ => record.status,
            };
            entries.push(StatusEntry {
                record_id: record.id,
                remote_id: record.remote_id,
                name: record.name,
                stored_status: record.status,
                status,
                blob_missing,
            });
        }

        Ok(StatusReport::new(
            connection.id(),
            connection.name(),
            connection.last_sync_at(),
            entries,
        ))
    }

    /// Every record in `conflict`, with both sides' hashes
    pub async fn conflicts(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<Vec<ConflictInfo>, SyncError> {
        self.ctx.connection(connection_id).await?;
        let records = self
            .ctx
            .records()
            .list_records(
                connection_id,
                &RecordFilter::new().with_status(SyncStatus::Conflict),
            )
            .await?;

        let mut conflicts = Vec::with_capacity(records.len());
        for record in &records {
            conflicts.push(self.ctx.describe_conflict(record).await);
        }
        Ok(conflicts)
    }

    /// Field-level diff between a record's blob and the remote
    ///
    /// Never writes. A staged record or a remote `NotFound` is reported as
    /// `remote_missing`.
    pub async fn diff(&self, record_id: &RecordId) -> Result<DiffReport, SyncError> {
        let record = self.record(record_id).await?;
        let connection = self.ctx.connection(&record.connection_id).await?;

        let local = self
            .ctx
            .read_local(&record)
            .await
            .map_err(|fault| SyncError::Item(fault.into_item_error(record.item_id())))?
            .ok_or_else(|| {
                SyncError::Validation(format!("local document for '{}' is missing", record.name))
            })?;

        let remote = match record.remote_id {
            Some(ref remote_id) => {
                let gateway = self.gateway(&connection)?;
                match gateway.get(remote_id).await {
                    Ok(remote) => Some(remote),
                    Err(e) if e.is_not_found() => None,
                    Err(e) => return Err(e.into()),
                }
            }
            None => None,
        };

        let changes = match remote {
            Some(ref remote) => diff_workflows(&local.workflow, remote)?,
            None => Vec::new(),
        };

        Ok(DiffReport {
            record_id: record.id,
            remote_id: record.remote_id,
            name: record.name,
            remote_missing: remote.is_none(),
            changes,
        })
    }

    /// History of a connection, newest first
    pub async fn history(
        &self,
        connection_id: &ConnectionId,
        limit: u32,
    ) -> Result<Vec<SyncHistoryEntry>, SyncError> {
        self.ctx.connection(connection_id).await?;
        Ok(self.ctx.records().list_history(connection_id, limit).await?)
    }

    // ========================================================================
    // Conflict resolution
    // ========================================================================

    /// Resolves a conflict by forcing one side over the other
    ///
    /// `KeepLocal` force-pushes just this record, `KeepRemote` force-pulls
    /// it. Either way the record ends `synced` and a `conflict_resolved`
    /// entry is appended.
    ///
    /// # Errors
    /// `NotConflicted` if the record is not in `conflict`; `Item` if the
    /// forced write failed, in which case the record stays in conflict.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_conflict(
        &self,
        record_id: &RecordId,
        resolution: Resolution,
    ) -> Result<WorkflowRecord, SyncError> {
        let record = self.record(record_id).await?;
        if !record.is_conflicted() {
            return Err(SyncError::NotConflicted(record_id.to_string()));
        }

        let errors = match resolution {
            Resolution::KeepLocal => {
                let options = PushOptions::only(vec![record.id]).forced();
                self.push(&record.connection_id, &options).await?.errors
            }
            Resolution::KeepRemote => {
                let remote_id = record.remote_id.clone().ok_or_else(|| {
                    SyncError::Validation(format!("record {record_id} has no remote identity"))
                })?;
                let options = PullOptions::only(vec![remote_id]).forced();
                self.pull(&record.connection_id, &options).await?.errors
            }
        };

        if let Some(error) = errors.into_iter().next() {
            warn!(record_id = %record_id, %resolution, error = %error, "Conflict resolution failed");
            return Err(SyncError::Item(error));
        }

        let resolved = self.record(record_id).await?;
        self.history.conflict_resolved(&resolved, resolution).await;
        info!(record_id = %record_id, %resolution, name = %resolved.name, "Conflict resolved");
        Ok(resolved)
    }
}
