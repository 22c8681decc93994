//! Domain entities and business logic
//!
//! This module contains the core domain types for FlowSync:
//! - Newtypes for identifiers and content hashes
//! - The typed workflow document
//! - Workflow records and their sync status
//! - Connections (remote endpoints)
//! - History log entries
//! - Domain-specific error types

pub mod connection;
pub mod errors;
pub mod history;
pub mod newtypes;
pub mod record;
pub mod workflow;

// Re-export commonly used types
pub use connection::Connection;
pub use errors::DomainError;
pub use history::{HistoryAction, SyncHistoryEntry};
pub use newtypes::*;
pub use record::{Resolution, SyncStatus, WorkflowRecord};
pub use workflow::{
    ConnectionEdge, Connections, Node, NodeOutputs, Workflow, WorkflowInput, WorkflowSettings,
};
