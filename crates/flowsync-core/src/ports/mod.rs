//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the traits the engine depends on. Their implementations live
//! in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IWorkflowGateway`] - Remote workflow service (list/get/create/update)
//! - [`IGatewayProvider`] - Builds a gateway for a given connection
//! - [`IRecordStore`] - Connections, workflow records and the history log
//! - [`IBlobStore`] - Full workflow documents keyed by connection and slot

pub mod blob_store;
pub mod gateway;
pub mod record_store;

pub use blob_store::{BlobKey, BlobSlot, IBlobStore};
pub use gateway::{
    GatewayError, IGatewayProvider, IWorkflowGateway, ListFilter, RejectedResource,
    WorkflowListing,
};
pub use record_store::{IRecordStore, RecordFilter};
