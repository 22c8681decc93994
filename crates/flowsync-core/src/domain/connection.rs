//! Connection domain entity
//!
//! A connection is one remote endpoint that workflows are synchronized with.
//! Records, history and blobs are all owned by a connection and go away with
//! it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{errors::DomainError, newtypes::ConnectionId};

/// A remote endpoint
///
/// The API key is never stored. `api_key_env` names the environment
/// variable that holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    id: ConnectionId,
    /// Unique, human-chosen name
    name: String,
    /// API root, e.g. `https://automation.example.com/api/v1`
    base_url: String,
    api_key_env: Option<String>,
    created_at: DateTime<Utc>,
    last_sync_at: Option<DateTime<Utc>>,
}

impl Connection {
    /// Creates a new connection
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ValidationFailed` if the name is empty or the
    /// base URL is not an absolute http(s) URL.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "connection name cannot be empty".to_string(),
            ));
        }

        let base_url = base_url.into();
        let parsed = Url::parse(&base_url).map_err(|e| {
            DomainError::ValidationFailed(format!("invalid base URL '{base_url}': {e}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DomainError::ValidationFailed(format!(
                "base URL must use http or https: {base_url}"
            )));
        }

        Ok(Self {
            id: ConnectionId::new(),
            name,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key_env: None,
            created_at: Utc::now(),
            last_sync_at: None,
        })
    }

    /// Rebuilds a connection from stored values without re-validating
    pub fn restore(
        id: ConnectionId,
        name: String,
        base_url: String,
        api_key_env: Option<String>,
        created_at: DateTime<Utc>,
        last_sync_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            name,
            base_url,
            api_key_env,
            created_at,
            last_sync_at,
        }
    }

    /// Sets the environment variable holding the API key
    pub fn with_api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key_env = Some(var.into());
        self
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key_env(&self) -> Option<&str> {
        self.api_key_env.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        self.last_sync_at
    }

    /// Records that a sync operation just completed
    pub fn touch_last_sync(&mut self, at: DateTime<Utc>) {
        self.last_sync_at = Some(at);
    }
}
