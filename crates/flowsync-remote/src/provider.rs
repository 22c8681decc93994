//! HttpGatewayProvider - IGatewayProvider for HTTP connections
//!
//! Builds one [`HttpGateway`] per connection. The API key is read from the
//! environment variable the connection names, at the moment the gateway is
//! built; it is never persisted.

use std::sync::Arc;

use tracing::debug;

use flowsync_core::config::RemoteConfig;
use flowsync_core::domain::Connection;
use flowsync_core::ports::{GatewayError, IGatewayProvider, IWorkflowGateway};

use crate::client::{GatewayOptions, HttpGateway};

/// Builds HTTP gateways with shared transport options
#[derive(Debug, Clone, Default)]
pub struct HttpGatewayProvider {
    options: GatewayOptions,
}

impl HttpGatewayProvider {
    pub fn new(options: GatewayOptions) -> Self {
        Self { options }
    }

    pub fn from_config(config: &RemoteConfig) -> Self {
        Self::new(GatewayOptions::from(config))
    }

    /// Builds the concrete gateway for a connection
    ///
    /// # Errors
    /// Returns `GatewayError::Unauthorized` if the connection names an API
    /// key variable that is unset or empty.
    pub fn build(&self, connection: &Connection) -> Result<HttpGateway, GatewayError> {
        let gateway = HttpGateway::new(connection.base_url(), self.options.clone())?;

        match connection.api_key_env() {
            Some(var) => {
                let key = std::env::var(var)
                    .ok()
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| {
                        GatewayError::Unauthorized(format!(
                            "environment variable {var} holding the API key for connection '{}' is not set",
                            connection.name()
                        ))
                    })?;
                debug!(connection = connection.name(), var, "Resolved API key from environment");
                Ok(gateway.with_api_key(key))
            }
            None => Ok(gateway),
        }
    }
}

impl IGatewayProvider for HttpGatewayProvider {
    fn gateway_for(
        &self,
        connection: &Connection,
    ) -> Result<Arc<dyn IWorkflowGateway>, GatewayError> {
        Ok(Arc::new(self.build(connection)?))
    }
}
