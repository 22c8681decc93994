//! SQLite record store
//!
//! Implements [`IRecordStore`] on top of the schema in `migrations/`.
//! Timestamps are stored as RFC 3339 text, statuses and actions as their
//! stable string forms.

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use flowsync_core::domain::{
    Connection, ConnectionId, ContentHash, HistoryAction, RecordId, RemoteId, SyncHistoryEntry,
    SyncStatus, WorkflowRecord,
};
use flowsync_core::ports::{IRecordStore, RecordFilter};

use crate::CacheError;

/// SQLite-based implementation of the record store port
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Creates a new store with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Parse a DateTime<Utc> from an RFC 3339 string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            CacheError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

fn parse_optional_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, CacheError> {
    match s {
        Some(ref val) if !val.is_empty() => parse_datetime(val).map(Some),
        _ => Ok(None),
    }
}

fn parse_domain<T>(value: &str, what: &str) -> Result<T, CacheError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| CacheError::SerializationError(format!("Invalid {what} '{value}': {e}")))
}

fn map_unique_violation(e: sqlx::Error, what: String) -> anyhow::Error {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return CacheError::AlreadyExists(what).into();
        }
    }
    CacheError::from(e).into()
}

// ============================================================================
// Row mapping functions
// ============================================================================

fn connection_from_row(row: &SqliteRow) -> Result<Connection, CacheError> {
    let id: String = row.get("id");
    let created_at: String = row.get("created_at");
    let last_sync_at: Option<String> = row.get("last_sync_at");

    Ok(Connection::restore(
        parse_domain::<ConnectionId>(&id, "connection id")?,
        row.get("name"),
        row.get("base_url"),
        row.get("api_key_env"),
        parse_datetime(&created_at)?,
        parse_optional_datetime(last_sync_at)?,
    ))
}

fn record_from_row(row: &SqliteRow) -> Result<WorkflowRecord, CacheError> {
    let id: String = row.get("id");
    let connection_id: String = row.get("connection_id");
    let remote_id: Option<String> = row.get("remote_id");
    let content_hash: Option<String> = row.get("content_hash");
    let local_updated_at: String = row.get("local_updated_at");
    let remote_updated_at: Option<String> = row.get("remote_updated_at");
    let status: String = row.get("sync_status");
    let active: i64 = row.get("active");

    Ok(WorkflowRecord {
        id: parse_domain::<RecordId>(&id, "record id")?,
        connection_id: parse_domain::<ConnectionId>(&connection_id, "connection id")?,
        remote_id: remote_id
            .as_deref()
            .map(|r| parse_domain::<RemoteId>(r, "remote id"))
            .transpose()?,
        name: row.get("name"),
        active: active != 0,
        content_hash: content_hash
            .as_deref()
            .map(|h| parse_domain::<ContentHash>(h, "content hash"))
            .transpose()?,
        local_updated_at: parse_datetime(&local_updated_at)?,
        remote_updated_at: parse_optional_datetime(remote_updated_at)?,
        status: parse_domain::<SyncStatus>(&status, "sync status")?,
    })
}

fn history_from_row(row: &SqliteRow) -> Result<SyncHistoryEntry, CacheError> {
    let id: i64 = row.get("id");
    let connection_id: String = row.get("connection_id");
    let record_id: Option<String> = row.get("record_id");
    let action: String = row.get("action");
    let details: String = row.get("details");
    let timestamp: String = row.get("timestamp");

    let details: serde_json::Value = serde_json::from_str(&details)
        .map_err(|e| CacheError::SerializationError(format!("Invalid details JSON: {}", e)))?;

    let mut entry = SyncHistoryEntry::new(
        parse_domain::<ConnectionId>(&connection_id, "connection id")?,
        parse_domain::<HistoryAction>(&action, "history action")?,
    )
    .with_id(id)
    .with_details(details)
    .with_timestamp(parse_datetime(&timestamp)?);

    if let Some(record_id) = record_id {
        entry = entry.with_record_id(parse_domain::<RecordId>(&record_id, "record id")?);
    }

    Ok(entry)
}

// ============================================================================
// IRecordStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IRecordStore for SqliteRecordStore {
    // --- Connections ---

    async fn add_connection(&self, connection: &Connection) -> anyhow::Result<()> {
        let id = connection.id().to_string();

        sqlx::query(
            "INSERT INTO connections \
             (id, name, base_url, api_key_env, created_at, last_sync_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(connection.name())
        .bind(connection.base_url())
        .bind(connection.api_key_env())
        .bind(connection.created_at().to_rfc3339())
        .bind(connection.last_sync_at().map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, format!("connection '{}'", connection.name())))?;

        tracing::debug!(connection_id = %id, name = connection.name(), "Saved connection");
        Ok(())
    }

    async fn get_connection(&self, id: &ConnectionId) -> anyhow::Result<Option<Connection>> {
        let row = sqlx::query("SELECT * FROM connections WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(connection_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn get_connection_by_name(&self, name: &str) -> anyhow::Result<Option<Connection>> {
        let row = sqlx::query("SELECT * FROM connections WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(connection_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn list_connections(&self) -> anyhow::Result<Vec<Connection>> {
        let rows = sqlx::query("SELECT * FROM connections ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut connections = Vec::with_capacity(rows.len());
        for row in &rows {
            connections.push(connection_from_row(row)?);
        }
        Ok(connections)
    }

    async fn remove_connection(&self, id: &ConnectionId) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM connections WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        tracing::debug!(connection_id = %id, removed, "Removed connection");
        Ok(removed)
    }

    async fn touch_last_sync(&self, id: &ConnectionId, at: DateTime<Utc>) -> anyhow::Result<()> {
        sqlx::query("UPDATE connections SET last_sync_at = ? WHERE id = ?")
            .bind(at.to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- Workflow records ---

    async fn save_record(&self, record: &WorkflowRecord) -> anyhow::Result<()> {
        let id = record.id.to_string();

        sqlx::query(
            "INSERT INTO workflow_records \
             (id, connection_id, remote_id, name, active, content_hash, \
              local_updated_at, remote_updated_at, sync_status) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
              remote_id = excluded.remote_id, \
              name = excluded.name, \
              active = excluded.active, \
              content_hash = excluded.content_hash, \
              local_updated_at = excluded.local_updated_at, \
              remote_updated_at = excluded.remote_updated_at, \
              sync_status = excluded.sync_status",
        )
        .bind(&id)
        .bind(record.connection_id.to_string())
        .bind(record.remote_id.as_ref().map(|r| r.as_str().to_string()))
        .bind(&record.name)
        .bind(i64::from(record.active))
        .bind(record.content_hash.as_ref().map(|h| h.as_str().to_string()))
        .bind(record.local_updated_at.to_rfc3339())
        .bind(record.remote_updated_at.map(|dt| dt.to_rfc3339()))
        .bind(record.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, format!("record for remote id {}", record.item_id())))?;

        tracing::trace!(record_id = %id, status = %record.status, "Saved workflow record");
        Ok(())
    }

    async fn get_record(&self, id: &RecordId) -> anyhow::Result<Option<WorkflowRecord>> {
        let row = sqlx::query("SELECT * FROM workflow_records WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(record_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn get_record_by_remote_id(
        &self,
        connection_id: &ConnectionId,
        remote_id: &RemoteId,
    ) -> anyhow::Result<Option<WorkflowRecord>> {
        let row = sqlx::query(
            "SELECT * FROM workflow_records WHERE connection_id = ? AND remote_id = ?",
        )
        .bind(connection_id.to_string())
        .bind(remote_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(record_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn list_records(
        &self,
        connection_id: &ConnectionId,
        filter: &RecordFilter,
    ) -> anyhow::Result<Vec<WorkflowRecord>> {
        let mut sql = String::from("SELECT * FROM workflow_records WHERE connection_id = ?");
        if filter.status.is_some() {
            sql.push_str(" AND sync_status = ?");
        }
        sql.push_str(" ORDER BY name ASC, id ASC");

        let mut query = sqlx::query(&sql).bind(connection_id.to_string());
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(record_from_row(row)?);
        }
        Ok(records)
    }

    // --- History ---

    async fn append_history(&self, entry: &SyncHistoryEntry) -> anyhow::Result<i64> {
        let details = serde_json::to_string(entry.details())
            .map_err(|e| anyhow::anyhow!("Failed to serialize history details: {}", e))?;

        let result = sqlx::query(
            "INSERT INTO sync_history \
             (connection_id, record_id, action, details, timestamp) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entry.connection_id().to_string())
        .bind(entry.record_id().map(|r| r.to_string()))
        .bind(entry.action().as_str())
        .bind(&details)
        .bind(entry.timestamp().to_rfc3339())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        tracing::trace!(history_id = id, action = %entry.action(), "Appended history entry");
        Ok(id)
    }

    async fn list_history(
        &self,
        connection_id: &ConnectionId,
        limit: u32,
    ) -> anyhow::Result<Vec<SyncHistoryEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM sync_history WHERE connection_id = ? \
             ORDER BY id DESC LIMIT ?",
        )
        .bind(connection_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(history_from_row(row)?);
        }
        Ok(entries)
    }
}
