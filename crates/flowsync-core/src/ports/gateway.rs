//! Remote gateway port (driven/secondary port)
//!
//! The engine only depends on this contract; transport, pagination and
//! authentication are the adapter's business.
//!
//! ## Design Notes
//!
//! - Unlike the storage ports this one returns a typed [`GatewayError`]: the
//!   engine must tell `NotFound` apart from transport failures.
//! - Documents cross this boundary as validated [`Workflow`] values. Items of
//!   a listing that fail validation are reported in
//!   [`WorkflowListing::rejected`] instead of failing the whole listing.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::{Connection, RemoteId, Workflow, WorkflowInput};

// ============================================================================
// Errors
// ============================================================================

/// Failures reported by a gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The resource does not exist remotely
    #[error("workflow not found: {0}")]
    NotFound(String),

    /// Transport failure or timeout
    #[error("network error: {0}")]
    Network(String),

    /// Credentials missing or rejected
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-success HTTP status
    #[error("remote returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The remote returned a document that does not match the schema
    #[error("invalid workflow from remote: {0}")]
    Validation(String),

    /// The response body could not be decoded at all
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Returns true for `NotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound(_))
    }
}

// ============================================================================
// Listing
// ============================================================================

/// Optional criteria for `list`
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Only active (or only inactive) workflows
    pub active: Option<bool>,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }
}

/// A listed item that could not be turned into a [`Workflow`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedResource {
    /// Remote id if the item carried one
    pub remote_id: Option<String>,
    pub reason: String,
}

/// All pages of a listing, collected
#[derive(Debug, Clone, Default)]
pub struct WorkflowListing {
    pub workflows: Vec<Workflow>,
    pub rejected: Vec<RejectedResource>,
}

// ============================================================================
// Traits
// ============================================================================

/// Port trait for the remote workflow service
///
/// Every call is a single suspension point with its own timeout. No call is
/// retried by the engine.
#[async_trait::async_trait]
pub trait IWorkflowGateway: Send + Sync {
    /// Lists all workflows, following pagination to the end
    async fn list(&self, filter: &ListFilter) -> Result<WorkflowListing, GatewayError>;

    /// Fetches one workflow
    ///
    /// Fails with `GatewayError::NotFound` when it does not exist.
    async fn get(&self, id: &RemoteId) -> Result<Workflow, GatewayError>;

    /// Creates a workflow and returns the server's representation
    async fn create(&self, input: &WorkflowInput) -> Result<Workflow, GatewayError>;

    /// Replaces a workflow and returns the server's representation
    async fn update(&self, id: &RemoteId, input: &WorkflowInput)
        -> Result<Workflow, GatewayError>;
}

/// Builds gateways for connections
///
/// Resolving the connection's credentials happens here, once per operation.
pub trait IGatewayProvider: Send + Sync {
    fn gateway_for(
        &self,
        connection: &Connection,
    ) -> Result<Arc<dyn IWorkflowGateway>, GatewayError>;
}
