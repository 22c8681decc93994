//! FlowSync Sync - Pull/push synchronization engine
//!
//! Provides:
//! - Pull: reconciles remote workflows into local records and blobs
//! - Push: reconciles local edits and staged workflows into the remote
//! - Orchestration, status queries and conflict resolution
//!
//! ## Modules
//!
//! - [`engine`] - [`SyncEngine`], the entry point for every operation
//! - [`context`] - Explicit context (config + stores) passed to operations
//! - [`report`] - Result and report types returned to callers
//! - [`history`] - Non-fatal history log writer

pub mod context;
pub mod engine;
pub mod history;
mod pull;
mod push;
pub mod report;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use flowsync_conflict::ConflictError;
use flowsync_core::domain::DomainError;
use flowsync_core::ports::GatewayError;

pub use context::SyncContext;
pub use engine::SyncEngine;
pub use history::HistoryLogger;
pub use pull::PullOptions;
pub use push::PushOptions;
pub use report::{
    ConflictInfo, DiffReport, PullResult, PushResult, StatusEntry, StatusReport, SyncReport,
};

// ============================================================================
// Operation-level errors
// ============================================================================

/// Errors that abort a whole operation
///
/// Failures of a single workflow inside a batch never surface here; they are
/// collected as [`ItemError`]s in the operation result.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("workflow record not found: {0}")]
    RecordNotFound(String),

    /// Resolution was requested for a record that is not in conflict
    #[error("workflow record {0} is not in conflict")]
    NotConflicted(String),

    #[error("store error: {0:#}")]
    Store(anyhow::Error),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("validation error: {0}")]
    Validation(String),

    /// A single-record operation failed on its only item
    #[error("{0}")]
    Item(ItemError),
}

impl From<anyhow::Error> for SyncError {
    fn from(e: anyhow::Error) -> Self {
        SyncError::Store(e)
    }
}

impl From<DomainError> for SyncError {
    fn from(e: DomainError) -> Self {
        SyncError::Validation(e.to_string())
    }
}

impl From<ConflictError> for SyncError {
    fn from(e: ConflictError) -> Self {
        SyncError::Validation(e.to_string())
    }
}

// ============================================================================
// Item-level errors
// ============================================================================

/// Category of a per-item failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Network,
    NotFound,
    Validation,
    Store,
    /// The remote answered but refused or garbled the request
    Remote,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Network => "network",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Validation => "validation",
            ErrorCode::Store => "store",
            ErrorCode::Remote => "remote",
        }
    }

    fn from_gateway(e: &GatewayError) -> Self {
        match e {
            GatewayError::NotFound(_) => ErrorCode::NotFound,
            GatewayError::Network(_) => ErrorCode::Network,
            GatewayError::Validation(_) => ErrorCode::Validation,
            GatewayError::Unauthorized(_)
            | GatewayError::Status { .. }
            | GatewayError::InvalidResponse(_) => ErrorCode::Remote,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one workflow inside a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemError {
    /// Remote id, or local record id for staged workflows
    pub item_id: String,
    pub message: String,
    pub code: ErrorCode,
}

impl ItemError {
    pub fn new(item_id: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            message: message.into(),
            code,
        }
    }
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.item_id, self.message, self.code)
    }
}

/// What went wrong while processing one item
///
/// Lets item handlers use `?` across stores, gateway and validation; the
/// batch loop turns it into an [`ItemError`].
#[derive(Debug)]
pub(crate) enum ItemFault {
    Store(anyhow::Error),
    Gateway(GatewayError),
    Validation(String),
    Missing(String),
}

impl ItemFault {
    pub(crate) fn into_item_error(self, item_id: impl Into<String>) -> ItemError {
        let (code, message) = match self {
            ItemFault::Store(e) => (ErrorCode::Store, format!("{e:#}")),
            ItemFault::Gateway(e) => (ErrorCode::from_gateway(&e), e.to_string()),
            ItemFault::Validation(m) => (ErrorCode::Validation, m),
            ItemFault::Missing(m) => (ErrorCode::NotFound, m),
        };
        ItemError::new(item_id, code, message)
    }
}

impl From<anyhow::Error> for ItemFault {
    fn from(e: anyhow::Error) -> Self {
        ItemFault::Store(e)
    }
}

impl From<GatewayError> for ItemFault {
    fn from(e: GatewayError) -> Self {
        ItemFault::Gateway(e)
    }
}

impl From<DomainError> for ItemFault {
    fn from(e: DomainError) -> Self {
        ItemFault::Validation(e.to_string())
    }
}
