//! Validation failures raised while building domain values

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("malformed id: {0}")]
    InvalidId(String),

    #[error("bad remote id: {0}")]
    InvalidRemoteId(String),

    /// Not 64 lowercase hex characters
    #[error("bad content hash: {0}")]
    InvalidHash(String),

    #[error("unknown sync status: {0}")]
    InvalidStatus(String),

    /// The document violates the workflow schema (names, connections, shape)
    #[error("invalid workflow: {0}")]
    InvalidWorkflow(String),

    #[error("{0}")]
    ValidationFailed(String),
}
