//! Sync history entries
//!
//! The history log is append-only. Entries are written once by the engine
//! and only ever removed together with their connection.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::DomainError;
use super::newtypes::{ConnectionId, RecordId};

/// Kind of operation recorded in the history log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Pull,
    Push,
    ConflictResolved,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Pull => "pull",
            HistoryAction::Push => "push",
            HistoryAction::ConflictResolved => "conflict_resolved",
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pull" => Ok(HistoryAction::Pull),
            "push" => Ok(HistoryAction::Push),
            "conflict_resolved" => Ok(HistoryAction::ConflictResolved),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown history action: {other}"
            ))),
        }
    }
}

/// One entry of the history log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncHistoryEntry {
    /// Assigned by the store on append
    id: Option<i64>,
    connection_id: ConnectionId,
    /// Set when the entry concerns a single workflow
    record_id: Option<RecordId>,
    action: HistoryAction,
    /// Aggregate counts or resolution details
    details: Value,
    timestamp: DateTime<Utc>,
}

impl SyncHistoryEntry {
    /// Creates a new, not yet persisted entry stamped now
    pub fn new(connection_id: ConnectionId, action: HistoryAction) -> Self {
        Self {
            id: None,
            connection_id,
            record_id: None,
            action,
            details: Value::Null,
            timestamp: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_record_id(mut self, record_id: RecordId) -> Self {
        self.record_id = Some(record_id);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn action(&self) -> HistoryAction {
        self.action
    }

    pub fn details(&self) -> &Value {
        &self.details
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
