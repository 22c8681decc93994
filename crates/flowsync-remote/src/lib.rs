//! FlowSync Remote - HTTP gateway to the workflow service
//!
//! Provides:
//! - [`HttpGateway`] - `IWorkflowGateway` over the service's REST API
//!   (cursor-paginated listing, get, create, update)
//! - [`HttpGatewayProvider`] - builds a gateway per connection, resolving the
//!   API key from the environment variable the connection names
//!
//! Every request carries the configured timeout. Nothing is retried here;
//! a failed call surfaces as a [`GatewayError`](flowsync_core::ports::GatewayError).

pub mod client;
pub mod provider;

pub use client::{GatewayOptions, HttpGateway};
pub use provider::HttpGatewayProvider;
