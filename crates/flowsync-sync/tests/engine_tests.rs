//! SyncEngine scenarios
//!
//! Each test wires the engine to an in-memory SQLite record store, a blob
//! store in a temporary directory and an in-process fake remote.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;

use flowsync_cache::{DatabasePool, FsBlobStore, SqliteRecordStore};
use flowsync_core::config::Config;
use flowsync_core::domain::{
    Connection, HistoryAction, RemoteId, Resolution, SyncStatus, Workflow, WorkflowInput,
    WorkflowRecord,
};
use flowsync_core::hasher::canonical_hash;
use flowsync_core::ports::{
    BlobKey, BlobSlot, GatewayError, IGatewayProvider, IWorkflowGateway, ListFilter,
    WorkflowListing,
};
use flowsync_sync::{ErrorCode, PullOptions, PushOptions, SyncContext, SyncEngine, SyncError};

// ============================================================================
// Fake remote
// ============================================================================

/// In-process stand-in for the workflow service
///
/// Writes through `create`/`update` behave like the real server: they stamp
/// `updatedAt` and add a `versionId`, so the echo differs from the input.
struct FakeRemote {
    workflows: Mutex<BTreeMap<String, Workflow>>,
    failing: Mutex<HashSet<String>>,
    /// Listed without an id, as a misbehaving server might
    anonymous: Mutex<Vec<Workflow>>,
    writes: AtomicUsize,
    clock: AtomicUsize,
}

impl FakeRemote {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            workflows: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(HashSet::new()),
            anonymous: Mutex::new(Vec::new()),
            writes: AtomicUsize::new(0),
            clock: AtomicUsize::new(0),
        })
    }

    fn tick(&self) -> DateTime<Utc> {
        let n = self.clock.fetch_add(1, Ordering::SeqCst) as i64 + 1;
        Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap() + Duration::seconds(n)
    }

    fn insert(&self, value: Value) {
        let workflow = Workflow::from_value(value).unwrap();
        let id = workflow.id.clone().unwrap();
        self.workflows
            .lock()
            .unwrap()
            .insert(id.as_str().to_string(), workflow);
    }

    fn doc(&self, id: &str) -> Workflow {
        self.workflows.lock().unwrap().get(id).cloned().unwrap()
    }

    /// Edits a workflow as another client of the service would
    fn edit(&self, id: &str, f: impl FnOnce(&mut Workflow)) {
        let stamp = self.tick();
        let mut workflows = self.workflows.lock().unwrap();
        let workflow = workflows.get_mut(id).unwrap();
        f(workflow);
        workflow.updated_at = Some(stamp);
    }

    fn delete(&self, id: &str) {
        self.workflows.lock().unwrap().remove(id);
    }

    fn insert_anonymous(&self, name: &str) {
        self.anonymous.lock().unwrap().push(Workflow::new(name));
    }

    fn fail(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_failing(&self, id: &str) -> Result<(), GatewayError> {
        if self.failing.lock().unwrap().contains(id) {
            return Err(GatewayError::Network("connection reset".to_string()));
        }
        Ok(())
    }

    fn materialize(
        &self,
        id: &str,
        input: &WorkflowInput,
        previous: Option<&Workflow>,
    ) -> Workflow {
        let stamp = self.tick();
        let version = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        let mut workflow = Workflow::new(input.name.clone());
        workflow.id = Some(RemoteId::new(id).unwrap());
        workflow.active = previous.map(|p| p.active).unwrap_or(false);
        workflow.nodes = input.nodes.clone();
        workflow.connections = input.connections.clone();
        workflow.settings = input.settings.clone();
        workflow.static_data = input.static_data.clone();
        workflow.created_at = previous.and_then(|p| p.created_at).or(Some(stamp));
        workflow.updated_at = Some(stamp);
        workflow
            .extra
            .insert("versionId".to_string(), json!(format!("v{version}")));
        workflow
    }
}

#[async_trait::async_trait]
impl IWorkflowGateway for FakeRemote {
    async fn list(&self, _filter: &ListFilter) -> Result<WorkflowListing, GatewayError> {
        let mut workflows: Vec<Workflow> =
            self.workflows.lock().unwrap().values().cloned().collect();
        workflows.extend(self.anonymous.lock().unwrap().iter().cloned());
        Ok(WorkflowListing {
            workflows,
            rejected: Vec::new(),
        })
    }

    async fn get(&self, id: &RemoteId) -> Result<Workflow, GatewayError> {
        self.check_failing(id.as_str())?;
        self.workflows
            .lock()
            .unwrap()
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }

    async fn create(&self, input: &WorkflowInput) -> Result<Workflow, GatewayError> {
        let id = format!("wf-new-{}", self.writes() + 1);
        let created = self.materialize(&id, input, None);
        self.workflows.lock().unwrap().insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: &RemoteId, input: &WorkflowInput) -> Result<Workflow, GatewayError> {
        self.check_failing(id.as_str())?;
        let previous = self
            .workflows
            .lock()
            .unwrap()
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        let updated = self.materialize(id.as_str(), input, Some(&previous));
        self.workflows
            .lock()
            .unwrap()
            .insert(id.as_str().to_string(), updated.clone());
        Ok(updated)
    }
}

struct FakeProvider(Arc<FakeRemote>);

impl IGatewayProvider for FakeProvider {
    fn gateway_for(
        &self,
        _connection: &Connection,
    ) -> Result<Arc<dyn IWorkflowGateway>, GatewayError> {
        let gateway: Arc<dyn IWorkflowGateway> = self.0.clone();
        Ok(gateway)
    }
}

// ============================================================================
// Test helpers
// ============================================================================

struct Harness {
    engine: SyncEngine,
    remote: Arc<FakeRemote>,
    blobs: FsBlobStore,
    connection: Connection,
    _dir: TempDir,
}

impl Harness {
    async fn record(&self, remote_id: &str) -> WorkflowRecord {
        self.engine
            .context()
            .records()
            .get_record_by_remote_id(&self.connection.id(), &RemoteId::new(remote_id).unwrap())
            .await
            .unwrap()
            .unwrap()
    }

    fn blob_path(&self, record: &WorkflowRecord, slot: BlobSlot) -> PathBuf {
        self.blobs
            .path_for(&BlobKey::new(record.connection_id, record.blob_slot()), slot)
    }

    fn read_blob(&self, record: &WorkflowRecord) -> Vec<u8> {
        std::fs::read(self.blob_path(record, BlobSlot::Primary)).unwrap()
    }

    /// Edits a primary blob on disk, bypassing the engine
    fn edit_local(&self, record: &WorkflowRecord, f: impl FnOnce(&mut Value)) {
        let path = self.blob_path(record, BlobSlot::Primary);
        let mut value: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        f(&mut value);
        std::fs::write(&path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
    }

    async fn pull(&self) -> flowsync_sync::PullResult {
        self.engine
            .pull(&self.connection.id(), &PullOptions::all())
            .await
            .unwrap()
    }

    async fn push(&self) -> flowsync_sync::PushResult {
        self.engine
            .push(&self.connection.id(), &PushOptions::all())
            .await
            .unwrap()
    }

    /// Pulls once, then edits both sides of `wf-1` differently
    async fn conflicted(&self) -> WorkflowRecord {
        self.pull().await;
        let record = self.record("wf-1").await;
        self.edit_local(&record, |doc| {
            doc["nodes"][1]["parameters"]["table"] = json!("local_leads");
        });
        self.remote.edit("wf-1", |wf| {
            wf.nodes[1]
                .parameters
                .insert("table".to_string(), json!("remote_leads"));
        });
        let result = self.push().await;
        assert_eq!(result.conflicts.len(), 1);
        self.record("wf-1").await
    }
}

fn workflow_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "active": true,
        "createdAt": "2026-01-10T08:00:00Z",
        "updatedAt": "2026-01-12T09:30:00Z",
        "nodes": [
            {
                "id": "n-1",
                "name": "Webhook",
                "type": "base.webhook",
                "typeVersion": 2,
                "position": [250, 300],
                "parameters": { "path": "lead" }
            },
            {
                "id": "n-2",
                "name": "Store",
                "type": "base.postgres",
                "position": [500, 300],
                "parameters": { "table": "leads" }
            }
        ],
        "connections": {
            "Webhook": { "main": [[{ "node": "Store", "type": "main", "index": 0 }]] }
        },
        "settings": { "executionOrder": "v1" }
    })
}

async fn setup() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    let records = Arc::new(SqliteRecordStore::new(pool.pool().clone()));
    let blobs = FsBlobStore::new(dir.path());
    let ctx = SyncContext::new(
        Arc::new(Config::default()),
        records,
        Arc::new(blobs.clone()),
    );

    let remote = FakeRemote::new();
    remote.insert(workflow_json("wf-1", "Lead intake"));
    remote.insert(workflow_json("wf-2", "Nightly report"));

    let engine = SyncEngine::new(ctx, Arc::new(FakeProvider(remote.clone())));
    let connection = Connection::new("prod", "https://wf.example.com/api/v1").unwrap();
    engine.add_connection(&connection).await.unwrap();

    Harness {
        engine,
        remote,
        blobs,
        connection,
        _dir: dir,
    }
}

// ============================================================================
// Pull
// ============================================================================

#[tokio::test]
async fn test_first_pull_creates_records_and_blobs() {
    let h = setup().await;
    let result = h.pull().await;

    assert_eq!(result.created, 2);
    assert!(result.errors.is_empty());

    let record = h.record("wf-1").await;
    assert_eq!(record.status, SyncStatus::Synced);
    assert_eq!(record.name, "Lead intake");
    assert!(record.active);
    assert_eq!(
        record.content_hash,
        Some(canonical_hash(&h.remote.doc("wf-1")).unwrap())
    );
    assert_eq!(h.read_blob(&record), h.remote.doc("wf-1").to_blob().unwrap());

    let conn = h.engine.find_connection("prod").await.unwrap();
    assert!(conn.last_sync_at().is_some());
}

#[tokio::test]
async fn test_pull_is_idempotent() {
    let h = setup().await;
    h.pull().await;
    let before = h.record("wf-1").await;

    let result = h.pull().await;
    assert_eq!(result.created, 0);
    assert_eq!(result.updated, 0);
    assert_eq!(result.unchanged, 2);
    assert_eq!(h.record("wf-1").await, before);
}

#[tokio::test]
async fn test_pull_ignores_volatile_remote_fields() {
    let h = setup().await;
    h.pull().await;
    // Server touched the timestamp only
    h.remote.edit("wf-1", |_| {});

    let result = h.pull().await;
    assert_eq!(result.unchanged, 2);
}

#[tokio::test]
async fn test_pull_remote_rename_updates_record() {
    let h = setup().await;
    h.pull().await;
    h.remote.edit("wf-1", |wf| wf.name = "Lead intake v2".to_string());

    let result = h.pull().await;
    assert_eq!(result.updated, 1);
    assert_eq!(result.unchanged, 1);

    let record = h.record("wf-1").await;
    assert_eq!(record.name, "Lead intake v2");
    assert_eq!(record.status, SyncStatus::Synced);
    assert_eq!(
        record.content_hash,
        Some(canonical_hash(&h.remote.doc("wf-1")).unwrap())
    );
    assert_eq!(record.remote_updated_at, h.remote.doc("wf-1").updated_at);
}

#[tokio::test]
async fn test_pull_keeps_local_only_edits() {
    let h = setup().await;
    h.pull().await;
    let record = h.record("wf-1").await;
    h.edit_local(&record, |doc| doc["name"] = json!("Edited offline"));
    let edited = h.read_blob(&record);

    let result = h.pull().await;
    assert_eq!(result.unchanged, 2);
    assert_eq!(h.read_blob(&record), edited);
}

#[tokio::test]
async fn test_pull_detects_conflict_and_keeps_local() {
    let h = setup().await;
    h.pull().await;
    let record = h.record("wf-1").await;
    h.edit_local(&record, |doc| doc["name"] = json!("Local name"));
    h.remote.edit("wf-1", |wf| wf.name = "Remote name".to_string());
    let edited = h.read_blob(&record);

    let result = h.pull().await;
    assert_eq!(result.conflicts, 1);
    assert_eq!(result.updated, 0);

    let record = h.record("wf-1").await;
    assert_eq!(record.status, SyncStatus::Conflict);
    assert_eq!(h.read_blob(&record), edited);
    let pending = std::fs::read(h.blob_path(&record, BlobSlot::PendingRemote)).unwrap();
    assert_eq!(Workflow::parse(&pending).unwrap().name, "Remote name");
}

#[tokio::test]
async fn test_pull_on_conflict_refreshes_pending_snapshot() {
    let h = setup().await;
    let record = h.conflicted().await;
    let local = h.read_blob(&record);

    h.remote.edit("wf-1", |wf| wf.name = "Third edit".to_string());
    let result = h.pull().await;
    assert_eq!(result.conflicts, 1);

    let record = h.record("wf-1").await;
    assert_eq!(record.status, SyncStatus::Conflict);
    assert_eq!(record.remote_updated_at, h.remote.doc("wf-1").updated_at);
    assert_eq!(h.read_blob(&record), local);
    let pending = std::fs::read(h.blob_path(&record, BlobSlot::PendingRemote)).unwrap();
    assert_eq!(Workflow::parse(&pending).unwrap().name, "Third edit");
}

#[tokio::test]
async fn test_forced_pull_overwrites_local_edits() {
    let h = setup().await;
    h.pull().await;
    let record = h.record("wf-1").await;
    h.edit_local(&record, |doc| doc["name"] = json!("Local name"));
    h.remote.edit("wf-1", |wf| wf.name = "Remote name".to_string());

    let result = h
        .engine
        .pull(&h.connection.id(), &PullOptions::all().forced())
        .await
        .unwrap();
    assert_eq!(result.updated, 2);
    assert_eq!(result.conflicts, 0);
    assert_eq!(h.read_blob(&record), h.remote.doc("wf-1").to_blob().unwrap());
}

#[tokio::test]
async fn test_pull_repairs_missing_blob() {
    let h = setup().await;
    h.pull().await;
    let record = h.record("wf-2").await;
    std::fs::remove_file(h.blob_path(&record, BlobSlot::Primary)).unwrap();

    let result = h.pull().await;
    assert_eq!(result.updated, 1);
    assert_eq!(result.unchanged, 1);
    assert_eq!(h.read_blob(&record), h.remote.doc("wf-2").to_blob().unwrap());
}

#[tokio::test]
async fn test_full_pull_marks_deleted_remote() {
    let h = setup().await;
    h.pull().await;
    h.remote.delete("wf-2");

    let result = h.pull().await;
    assert_eq!(result.deleted_remote, 1);
    assert_eq!(result.unchanged, 1);
    assert_eq!(h.record("wf-2").await.status, SyncStatus::DeletedRemote);

    // Not repeated once marked
    let again = h.pull().await;
    assert_eq!(again.deleted_remote, 0);
}

#[tokio::test]
async fn test_subset_pull_not_found() {
    let h = setup().await;
    h.pull().await;
    h.remote.delete("wf-2");

    let ids = vec![RemoteId::new("wf-2").unwrap(), RemoteId::new("wf-9").unwrap()];
    let result = h
        .engine
        .pull(&h.connection.id(), &PullOptions::only(ids))
        .await
        .unwrap();
    assert_eq!(result.deleted_remote, 1);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].item_id, "wf-9");
    assert_eq!(result.errors[0].code, ErrorCode::NotFound);
}

#[tokio::test]
async fn test_pull_reports_listed_workflow_without_id() {
    let h = setup().await;
    h.remote.insert_anonymous("Nameless");

    let result = h.pull().await;
    assert_eq!(result.created, 2);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code, ErrorCode::Validation);
    assert!(result.errors[0].message.contains("Nameless"));
}

#[tokio::test]
async fn test_pull_unknown_connection_fails() {
    let h = setup().await;
    let ghost = Connection::new("ghost", "https://other.example.com").unwrap();
    let err = h
        .engine
        .pull(&ghost.id(), &PullOptions::all())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::ConnectionNotFound(_)));
}

// ============================================================================
// Push
// ============================================================================

#[tokio::test]
async fn test_push_local_edit() {
    let h = setup().await;
    h.pull().await;
    let record = h.record("wf-1").await;
    h.edit_local(&record, |doc| {
        doc["nodes"][1]["parameters"]["table"] = json!("prospects");
    });

    let result = h.push().await;
    assert_eq!(result.updated, 1);
    assert!(result.conflicts.is_empty());
    assert_eq!(h.remote.writes(), 1);

    let remote = h.remote.doc("wf-1");
    assert_eq!(remote.nodes[1].parameters["table"], json!("prospects"));

    // Base and blob follow the server's echo, not the local input
    let record = h.record("wf-1").await;
    let echo_hash = canonical_hash(&remote).unwrap();
    assert_eq!(record.status, SyncStatus::Synced);
    assert_eq!(record.content_hash, Some(echo_hash.clone()));
    let blob = Workflow::parse(&h.read_blob(&record)).unwrap();
    assert_eq!(canonical_hash(&blob).unwrap(), echo_hash);
    assert_eq!(blob.extra["versionId"], json!("v1"));

    // Nothing left to push
    let again = h.push().await;
    assert_eq!(again.pushed(), 0);
    assert_eq!(h.remote.writes(), 1);
}

#[tokio::test]
async fn test_push_conflict_does_not_write_remote() {
    let h = setup().await;
    let record = h.conflicted().await;

    assert_eq!(record.status, SyncStatus::Conflict);
    assert_eq!(h.remote.writes(), 0);
    assert_eq!(
        h.remote.doc("wf-1").nodes[1].parameters["table"],
        json!("remote_leads")
    );

    // Refused again without force
    let again = h.push().await;
    assert_eq!(again.conflicts.len(), 1);
    assert_eq!(again.conflicts[0].workflow_id, record.id);
    assert!(again.conflicts[0].remote_hash.is_some());
    assert_eq!(h.remote.writes(), 0);

    // And a pull does not overwrite the local side either
    let pull = h.pull().await;
    assert_eq!(pull.conflicts, 1);
    let blob = Workflow::parse(&h.read_blob(&record)).unwrap();
    assert_eq!(blob.nodes[1].parameters["table"], json!("local_leads"));
}

#[tokio::test]
async fn test_push_converged_edit_writes_nothing() {
    let h = setup().await;
    h.pull().await;
    let record = h.record("wf-1").await;
    h.edit_local(&record, |doc| doc["name"] = json!("Same name"));
    h.remote.edit("wf-1", |wf| wf.name = "Same name".to_string());

    let result = h.push().await;
    assert_eq!(result.unchanged, 1);
    assert!(result.conflicts.is_empty());
    assert_eq!(h.remote.writes(), 0);

    let record = h.record("wf-1").await;
    assert_eq!(record.status, SyncStatus::Synced);
    assert_eq!(record.name, "Same name");
}

#[tokio::test]
async fn test_push_recreates_workflow_deleted_remotely() {
    let h = setup().await;
    h.pull().await;
    let record = h.record("wf-2").await;
    h.edit_local(&record, |doc| doc["name"] = json!("Report, revived"));
    h.remote.delete("wf-2");

    let result = h.push().await;
    assert_eq!(result.created, 1);

    let record = h
        .engine
        .context()
        .records()
        .get_record(&record.id)
        .await
        .unwrap()
        .unwrap();
    let new_id = record.remote_id.clone().unwrap();
    assert_ne!(new_id.as_str(), "wf-2");
    assert_eq!(h.remote.doc(new_id.as_str()).name, "Report, revived");
    assert!(h.blob_path(&record, BlobSlot::Primary).exists());
}

#[tokio::test]
async fn test_push_isolates_item_failures() {
    let h = setup().await;
    h.pull().await;
    for id in ["wf-1", "wf-2"] {
        let record = h.record(id).await;
        h.edit_local(&record, |doc| doc["name"] = json!(format!("{id} edited")));
    }
    h.remote.fail("wf-1");

    let result = h.push().await;
    assert_eq!(result.updated, 1);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].item_id, "wf-1");
    assert_eq!(result.errors[0].code, ErrorCode::Network);
    assert_eq!(h.remote.doc("wf-2").name, "wf-2 edited");
}

#[tokio::test]
async fn test_push_rejects_invalid_local_document() {
    let h = setup().await;
    h.pull().await;
    let record = h.record("wf-1").await;
    h.edit_local(&record, |doc| doc["nodes"][1]["name"] = json!("Webhook"));

    let result = h.push().await;
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code, ErrorCode::Validation);
    assert_eq!(h.remote.writes(), 0);
}

// ============================================================================
// Staging
// ============================================================================

#[tokio::test]
async fn test_stage_then_push_creates_remote() {
    let h = setup().await;
    let mut doc = workflow_json("ignored", "Fresh draft");
    doc.as_object_mut().unwrap().remove("id");
    let workflow = Workflow::from_value(doc).unwrap();

    let staged = h
        .engine
        .stage_local(&h.connection.id(), &workflow)
        .await
        .unwrap();
    assert_eq!(staged.status, SyncStatus::NewLocal);
    assert!(staged.remote_id.is_none());
    let staged_path = h.blob_path(&staged, BlobSlot::Primary);
    assert!(staged_path.exists());

    let result = h.push().await;
    assert_eq!(result.created, 1);

    let record = h
        .engine
        .context()
        .records()
        .get_record(&staged.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, SyncStatus::Synced);
    let remote_id = record.remote_id.clone().unwrap();
    assert_eq!(h.remote.doc(remote_id.as_str()).name, "Fresh draft");
    assert!(!staged_path.exists());
    assert!(h.blob_path(&record, BlobSlot::Primary).exists());
}

#[tokio::test]
async fn test_stage_rejects_invalid_workflow() {
    let h = setup().await;
    let mut doc = workflow_json("x", "Broken");
    doc["connections"] = json!({ "Ghost": { "main": [] } });
    let workflow: Workflow = serde_json::from_value(doc).unwrap();

    let err = h
        .engine
        .stage_local(&h.connection.id(), &workflow)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
}

// ============================================================================
// Status, conflicts, diff
// ============================================================================

#[tokio::test]
async fn test_status_reclassifies_out_of_band_edits() {
    let h = setup().await;
    h.pull().await;
    let edited = h.record("wf-1").await;
    h.edit_local(&edited, |doc| doc["active"] = json!(false));
    let missing = h.record("wf-2").await;
    std::fs::remove_file(h.blob_path(&missing, BlobSlot::Primary)).unwrap();

    let report = h.engine.status(&h.connection.id()).await.unwrap();
    assert_eq!(report.total(), 2);
    assert_eq!(report.count(SyncStatus::LocalModified), 1);

    let entry = report.entries.iter().find(|e| e.record_id == edited.id).unwrap();
    assert_eq!(entry.stored_status, SyncStatus::Synced);
    assert_eq!(entry.status, SyncStatus::LocalModified);
    assert!(!entry.blob_missing);

    let entry = report.entries.iter().find(|e| e.record_id == missing.id).unwrap();
    assert_eq!(entry.status, SyncStatus::Synced);
    assert!(entry.blob_missing);

    // Status is read-only
    assert_eq!(h.record("wf-1").await.status, SyncStatus::Synced);
}

#[tokio::test]
async fn test_conflicts_lists_both_hashes() {
    let h = setup().await;
    let record = h.conflicted().await;

    let conflicts = h.engine.conflicts(&h.connection.id()).await.unwrap();
    assert_eq!(conflicts.len(), 1);
    let info = &conflicts[0];
    assert_eq!(info.workflow_id, record.id);
    assert_eq!(info.workflow_name, "Lead intake");
    assert_eq!(
        info.remote_hash,
        Some(canonical_hash(&h.remote.doc("wf-1")).unwrap())
    );
    let local = Workflow::parse(&h.read_blob(&record)).unwrap();
    assert_eq!(info.local_hash, Some(canonical_hash(&local).unwrap()));
}

#[tokio::test]
async fn test_diff_reports_field_changes() {
    let h = setup().await;
    h.pull().await;
    let record = h.record("wf-1").await;
    h.edit_local(&record, |doc| {
        doc["nodes"][1]["parameters"]["table"] = json!("prospects");
        doc["nodes"][0]["position"] = json!([0, 0]);
    });

    let report = h.engine.diff(&record.id).await.unwrap();
    assert!(!report.remote_missing);
    assert_eq!(report.changes.len(), 1);
    assert_eq!(report.changes[0].path, "node \"Store\".table");
    assert_eq!(report.changes[0].local_value, Some(json!("prospects")));
    assert_eq!(report.changes[0].remote_value, Some(json!("leads")));

    // Read-only
    assert_eq!(h.record("wf-1").await, record);
    assert_eq!(h.remote.writes(), 0);
}

#[tokio::test]
async fn test_diff_without_remote_counterpart() {
    let h = setup().await;
    h.pull().await;
    h.remote.delete("wf-2");
    let record = h.record("wf-2").await;

    let report = h.engine.diff(&record.id).await.unwrap();
    assert!(report.remote_missing);
    assert!(report.changes.is_empty());
    assert!(!report.is_identical());
}

// ============================================================================
// Conflict resolution
// ============================================================================

#[tokio::test]
async fn test_resolve_keep_local() {
    let h = setup().await;
    let record = h.conflicted().await;

    let resolved = h
        .engine
        .resolve_conflict(&record.id, Resolution::KeepLocal)
        .await
        .unwrap();

    let remote = h.remote.doc("wf-1");
    assert_eq!(remote.nodes[1].parameters["table"], json!("local_leads"));
    assert_eq!(resolved.status, SyncStatus::Synced);
    assert_eq!(resolved.content_hash, Some(canonical_hash(&remote).unwrap()));
    assert!(!h.blob_path(&resolved, BlobSlot::PendingRemote).exists());

    let status = h.engine.status(&h.connection.id()).await.unwrap();
    assert_eq!(status.count(SyncStatus::Synced), 2);

    let history = h.engine.history(&h.connection.id(), 1).await.unwrap();
    assert_eq!(history[0].action(), HistoryAction::ConflictResolved);
    assert_eq!(history[0].record_id(), Some(record.id));
    assert_eq!(history[0].details()["resolution"], "keep_local");
}

#[tokio::test]
async fn test_resolve_keep_remote() {
    let h = setup().await;
    let record = h.conflicted().await;

    let resolved = h
        .engine
        .resolve_conflict(&record.id, Resolution::KeepRemote)
        .await
        .unwrap();

    assert_eq!(resolved.status, SyncStatus::Synced);
    assert_eq!(h.remote.writes(), 0);
    assert_eq!(h.read_blob(&resolved), h.remote.doc("wf-1").to_blob().unwrap());
    assert!(!h.blob_path(&resolved, BlobSlot::PendingRemote).exists());
}

#[tokio::test]
async fn test_resolve_requires_conflict() {
    let h = setup().await;
    h.pull().await;
    let record = h.record("wf-1").await;

    let err = h
        .engine
        .resolve_conflict(&record.id, Resolution::KeepLocal)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::NotConflicted(_)));

    let unknown = WorkflowRecord::new_local(h.connection.id(), "ghost");
    let err = h
        .engine
        .resolve_conflict(&unknown.id, Resolution::KeepRemote)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::RecordNotFound(_)));
}

#[tokio::test]
async fn test_failed_resolution_keeps_conflict() {
    let h = setup().await;
    let record = h.conflicted().await;
    h.remote.fail("wf-1");

    let err = h
        .engine
        .resolve_conflict(&record.id, Resolution::KeepLocal)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Item(ref e) if e.code == ErrorCode::Network));
    assert_eq!(h.record("wf-1").await.status, SyncStatus::Conflict);
}

// ============================================================================
// Sync, history, connections
// ============================================================================

#[tokio::test]
async fn test_sync_pulls_then_pushes() {
    let h = setup().await;
    h.pull().await;
    let local = h.record("wf-1").await;
    h.edit_local(&local, |doc| doc["name"] = json!("Pushed name"));
    h.remote.edit("wf-2", |wf| wf.name = "Pulled name".to_string());

    let report = h.engine.sync(&h.connection.id(), false).await.unwrap();
    assert_eq!(report.pulled(), 1);
    assert_eq!(report.pushed(), 1);
    assert!(report.conflicts().is_empty());
    assert_eq!(report.errors().count(), 0);

    assert_eq!(h.remote.doc("wf-1").name, "Pushed name");
    assert_eq!(h.record("wf-2").await.name, "Pulled name");
}

#[tokio::test]
async fn test_forced_sync_lets_remote_win_without_writing_back() {
    let h = setup().await;
    h.pull().await;
    let local = h.record("wf-1").await;
    h.edit_local(&local, |doc| doc["name"] = json!("Discarded"));
    let writes_before = h.remote.writes();

    let report = h.engine.sync(&h.connection.id(), true).await.unwrap();
    assert_eq!(report.pushed(), 0);
    assert!(report.conflicts().is_empty());
    assert_eq!(h.remote.writes(), writes_before);

    let record = h.record("wf-1").await;
    let blob: Value = serde_json::from_slice(&h.read_blob(&record)).unwrap();
    assert_eq!(blob["name"], json!(h.remote.doc("wf-1").name));
    assert_eq!(record.status, SyncStatus::Synced);
}

#[tokio::test]
async fn test_history_newest_first() {
    let h = setup().await;
    h.pull().await;
    h.push().await;

    let history = h.engine.history(&h.connection.id(), 10).await.unwrap();
    let actions: Vec<HistoryAction> = history.iter().map(|e| e.action()).collect();
    assert_eq!(actions, vec![HistoryAction::Push, HistoryAction::Pull]);
    assert_eq!(history[1].details()["created"], 2);
}

#[tokio::test]
async fn test_remove_connection_drops_everything() {
    let h = setup().await;
    h.pull().await;
    let record = h.record("wf-1").await;
    assert!(h.blob_path(&record, BlobSlot::Primary).exists());

    h.engine.remove_connection(&h.connection.id()).await.unwrap();

    assert!(!h.blob_path(&record, BlobSlot::Primary).exists());
    assert!(h
        .engine
        .context()
        .records()
        .get_record(&record.id)
        .await
        .unwrap()
        .is_none());
    assert!(matches!(
        h.engine.find_connection("prod").await,
        Err(SyncError::ConnectionNotFound(_))
    ));
}

#[tokio::test]
async fn test_find_connection_by_id() {
    let h = setup().await;
    let found = h
        .engine
        .find_connection(&h.connection.id().to_string())
        .await
        .unwrap();
    assert_eq!(found.name(), "prod");
    assert_eq!(h.engine.connections().await.unwrap().len(), 1);
}
