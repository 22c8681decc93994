//! Typed workflow document
//!
//! This is the schema every workflow goes through, whether it arrives from
//! the remote service or is read back from a local blob. Fields the schema
//! does not model explicitly are preserved in `extra` maps so that hashing
//! and blob writes always see the complete document.
//!
//! ## Validation
//!
//! Deserialization enforces shape; [`Workflow::validate`] enforces the
//! cross-field rules (unique node names, connection sources that exist).
//! [`Workflow::parse`] does both and is what adapters should call.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use super::errors::DomainError;
use super::newtypes::RemoteId;

/// A workflow as exchanged with the remote service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Server-assigned identity (absent for documents never pushed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RemoteId>,
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub connections: Connections,
    #[serde(default)]
    pub settings: WorkflowSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Top-level fields not modelled above
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A single node of the workflow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_version: Option<Number>,
    /// Canvas coordinates. Presentation only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[Number; 2]>,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Node {
    /// Key used to match the same node across two snapshots
    ///
    /// The node's own id when present, its name otherwise.
    pub fn identity(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

/// One edge of the connection graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEdge {
    /// Target node name
    pub node: String,
    /// Input kind on the target (usually `main`)
    #[serde(rename = "type")]
    pub kind: String,
    /// Input index on the target
    pub index: u32,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Output slots of one node: output kind -> slot -> edges
///
/// A slot may be `null` in documents produced by the service; that is kept
/// as `None` so the document round-trips unchanged.
pub type NodeOutputs = BTreeMap<String, Vec<Option<Vec<ConnectionEdge>>>>;

/// Connection topology keyed by source node name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Connections(pub BTreeMap<String, NodeOutputs>);

impl Connections {
    /// Names of all source nodes
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Whether there are no connections at all
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Workflow-level settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_order: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_manual_executions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_workflow: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Workflow {
    /// Creates an empty workflow with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            active: false,
            nodes: Vec::new(),
            connections: Connections::default(),
            settings: WorkflowSettings::default(),
            static_data: None,
            created_at: None,
            updated_at: None,
            extra: BTreeMap::new(),
        }
    }

    /// Parses and validates a JSON document
    ///
    /// # Errors
    /// Returns `DomainError::InvalidWorkflow` if the document does not match
    /// the schema or breaks a cross-field rule.
    pub fn parse(bytes: &[u8]) -> Result<Self, DomainError> {
        let workflow: Workflow = serde_json::from_slice(bytes)
            .map_err(|e| DomainError::InvalidWorkflow(format!("malformed document: {e}")))?;
        workflow.validate()?;
        Ok(workflow)
    }

    /// Parses and validates an already-decoded JSON value
    ///
    /// # Errors
    /// Same as [`Workflow::parse`].
    pub fn from_value(value: Value) -> Result<Self, DomainError> {
        let workflow: Workflow = serde_json::from_value(value)
            .map_err(|e| DomainError::InvalidWorkflow(format!("malformed document: {e}")))?;
        workflow.validate()?;
        Ok(workflow)
    }

    /// Checks the cross-field rules of the schema
    ///
    /// # Errors
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidWorkflow(
                "workflow name cannot be empty".to_string(),
            ));
        }

        let mut names = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if node.name.trim().is_empty() {
                return Err(DomainError::InvalidWorkflow(
                    "node name cannot be empty".to_string(),
                ));
            }
            if !names.insert(node.name.as_str()) {
                return Err(DomainError::InvalidWorkflow(format!(
                    "duplicate node name '{}'",
                    node.name
                )));
            }
        }

        for source in self.connections.sources() {
            if !names.contains(source) {
                return Err(DomainError::InvalidWorkflow(format!(
                    "connection source '{source}' is not a node of this workflow"
                )));
            }
        }

        Ok(())
    }

    /// Serializes the document for the blob store
    ///
    /// Output is pretty-printed so the blob stays editable by hand.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidWorkflow` if serialization fails.
    pub fn to_blob(&self) -> Result<Vec<u8>, DomainError> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| DomainError::InvalidWorkflow(format!("cannot serialize: {e}")))
    }

    /// Builds the payload sent to the remote on create/update
    pub fn to_input(&self) -> WorkflowInput {
        WorkflowInput {
            name: self.name.clone(),
            nodes: self.nodes.clone(),
            connections: self.connections.clone(),
            settings: self.settings.clone(),
            static_data: self.static_data.clone(),
        }
    }
}

/// Write payload for create/update
///
/// Server-owned fields (`id`, `active`, timestamps) are never sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInput {
    pub name: String,
    pub nodes: Vec<Node>,
    pub connections: Connections,
    pub settings: WorkflowSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_data: Option<Value>,
}
