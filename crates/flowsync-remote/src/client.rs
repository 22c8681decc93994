//! HTTP client for the remote workflow service
//!
//! Endpoints, relative to the connection's base URL:
//!
//! | Operation | Request                                   |
//! |-----------|-------------------------------------------|
//! | list      | `GET /workflows?limit=N[&active=][&cursor=]` |
//! | get       | `GET /workflows/{id}`                     |
//! | create    | `POST /workflows`                         |
//! | update    | `PUT /workflows/{id}`                     |
//!
//! Listing responses have the shape `{ "data": [...], "nextCursor": ... }`;
//! pages are followed until the cursor is absent or empty.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use flowsync_remote::{GatewayOptions, HttpGateway};
//! use flowsync_core::ports::{IWorkflowGateway, ListFilter};
//!
//! # async fn example() -> Result<(), flowsync_core::ports::GatewayError> {
//! let gateway = HttpGateway::new("https://wf.example.com/api/v1", GatewayOptions::default())?
//!     .with_api_key("secret");
//! let listing = gateway.list(&ListFilter::new()).await?;
//! println!("{} workflows", listing.workflows.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use flowsync_core::config::RemoteConfig;
use flowsync_core::domain::{RemoteId, Workflow, WorkflowInput};
use flowsync_core::ports::{
    GatewayError, IWorkflowGateway, ListFilter, RejectedResource, WorkflowListing,
};

const WORKFLOWS_PATH: &str = "/workflows";

/// Longest error body quoted in a `GatewayError::Status`
const MAX_ERROR_BODY: usize = 512;

// ============================================================================
// Response types
// ============================================================================

/// One page of `GET /workflows`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    data: Vec<Value>,
    next_cursor: Option<String>,
}

// ============================================================================
// Options
// ============================================================================

/// Transport settings shared by every gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOptions {
    pub timeout: Duration,
    pub page_size: u32,
    pub api_key_header: String,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self::from(&RemoteConfig::default())
    }
}

impl From<&RemoteConfig> for GatewayOptions {
    fn from(config: &RemoteConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            page_size: config.page_size,
            api_key_header: config.api_key_header.clone(),
        }
    }
}

// ============================================================================
// HttpGateway
// ============================================================================

/// `IWorkflowGateway` over HTTP
pub struct HttpGateway {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    options: GatewayOptions,
}

impl HttpGateway {
    /// Creates a gateway for the API rooted at `base_url`
    ///
    /// # Errors
    /// Returns `GatewayError::Network` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, options: GatewayOptions) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| GatewayError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            options,
        })
    }

    /// Sends `key` in the configured API key header on every request
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates a request builder for `path` with authentication applied
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self
            .client
            .request(method, &url)
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.api_key {
            Some(key) => builder.header(self.options.api_key_header.as_str(), key),
            None => builder,
        }
    }

    fn item_path(id: &RemoteId) -> String {
        format!("{}/{}", WORKFLOWS_PATH, id.as_str())
    }

    /// Sends a request, mapping transport failures
    async fn send(&self, builder: RequestBuilder) -> Result<Response, GatewayError> {
        builder.send().await.map_err(map_transport_error)
    }

    /// Reads a single-workflow response body
    async fn read_workflow(response: Response) -> Result<Workflow, GatewayError> {
        let body = response.bytes().await.map_err(map_transport_error)?;
        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| GatewayError::InvalidResponse(format!("body is not JSON: {e}")))?;
        Workflow::from_value(value).map_err(|e| GatewayError::Validation(e.to_string()))
    }
}

/// Maps a reqwest failure to the transport variant
fn map_transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Network(format!("request timed out: {e}"))
    } else {
        GatewayError::Network(e.to_string())
    }
}

/// Turns non-success statuses into typed errors
///
/// `what` names the resource for `NotFound`.
async fn check_status(response: Response, what: &str) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut message = response.text().await.unwrap_or_default();
    if message.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }

    match status {
        StatusCode::NOT_FOUND => Err(GatewayError::NotFound(what.to_string())),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GatewayError::Unauthorized(
            format!("{} ({})", message, status.as_u16()),
        )),
        _ => Err(GatewayError::Status {
            status: status.as_u16(),
            message,
        }),
    }
}

#[async_trait::async_trait]
impl IWorkflowGateway for HttpGateway {
    async fn list(&self, filter: &ListFilter) -> Result<WorkflowListing, GatewayError> {
        let mut listing = WorkflowListing::default();
        let mut cursor: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let mut query: Vec<(&str, String)> =
                vec![("limit", self.options.page_size.to_string())];
            if let Some(active) = filter.active {
                query.push(("active", active.to_string()));
            }
            if let Some(ref c) = cursor {
                query.push(("cursor", c.clone()));
            }

            let response = self
                .send(self.request(Method::GET, WORKFLOWS_PATH).query(&query))
                .await?;
            let response = check_status(response, WORKFLOWS_PATH).await?;
            let body = response.bytes().await.map_err(map_transport_error)?;
            let page: ListPage = serde_json::from_slice(&body).map_err(|e| {
                GatewayError::InvalidResponse(format!("malformed listing page: {e}"))
            })?;
            pages += 1;

            debug!(page = pages, items = page.data.len(), "Fetched listing page");

            for item in page.data {
                let remote_id = item.get("id").and_then(Value::as_str).map(str::to_string);
                match Workflow::from_value(item) {
                    Ok(workflow) if workflow.id.is_some() => listing.workflows.push(workflow),
                    Ok(_) => listing.rejected.push(RejectedResource {
                        remote_id,
                        reason: "listed workflow has no id".to_string(),
                    }),
                    Err(e) => {
                        warn!(remote_id = ?remote_id, error = %e, "Rejected listed workflow");
                        listing.rejected.push(RejectedResource {
                            remote_id,
                            reason: e.to_string(),
                        });
                    }
                }
            }

            match page.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                    return Err(GatewayError::InvalidResponse(format!(
                        "pagination cursor did not advance: {next}"
                    )));
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(
            pages,
            workflows = listing.workflows.len(),
            rejected = listing.rejected.len(),
            "Listed remote workflows"
        );
        Ok(listing)
    }

    async fn get(&self, id: &RemoteId) -> Result<Workflow, GatewayError> {
        let path = Self::item_path(id);
        let response = self.send(self.request(Method::GET, &path)).await?;
        let response = check_status(response, id.as_str()).await?;
        debug!(remote_id = %id, "Fetched workflow");
        Self::read_workflow(response).await
    }

    async fn create(&self, input: &WorkflowInput) -> Result<Workflow, GatewayError> {
        let response = self
            .send(self.request(Method::POST, WORKFLOWS_PATH).json(input))
            .await?;
        let response = check_status(response, WORKFLOWS_PATH).await?;
        let created = Self::read_workflow(response).await?;
        if created.id.is_none() {
            return Err(GatewayError::InvalidResponse(
                "created workflow has no id".to_string(),
            ));
        }
        let remote_id = created.id.as_ref().map(RemoteId::as_str).unwrap_or_default();
        info!(remote_id, name = %created.name, "Created workflow");
        Ok(created)
    }

    async fn update(&self, id: &RemoteId, input: &WorkflowInput) -> Result<Workflow, GatewayError> {
        let path = Self::item_path(id);
        let response = self
            .send(self.request(Method::PUT, &path).json(input))
            .await?;
        let response = check_status(response, id.as_str()).await?;
        info!(remote_id = %id, name = %input.name, "Updated workflow");
        Self::read_workflow(response).await
    }
}
