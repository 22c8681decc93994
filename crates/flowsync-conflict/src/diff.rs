//! Field-level workflow diff
//!
//! Produces a human-inspectable list of changes between a local and a
//! remote snapshot. "Added" and "removed" are from the local point of view:
//! a node only present locally is `added`.
//!
//! ## Rules
//!
//! - `name` and `active` compare directly, one `modified` entry each.
//! - Nodes are matched by their own id, falling back to their name. Matched
//!   nodes expand into one entry per differing attribute or parameter,
//!   keyed `node "<name>".<key>`. Canvas position is never compared.
//! - `connections`, `settings`, `staticData` and unmodelled top-level
//!   fields are opaque blocks: any difference is a single `modified` entry.
//!
//! Output order: `name`, `active`, nodes in local order, remote-only nodes
//! in remote order, `connections`, `settings`, `staticData`, other fields
//! by key.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::Serialize;
use serde_json::Value;

use flowsync_core::domain::{Node, Workflow};

use crate::error::ConflictError;

/// Kind of a single change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::Modified => "modified",
        };
        write!(f, "{}", s)
    }
}

/// One difference between two snapshots
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub path: String,
    pub kind: ChangeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_value: Option<Value>,
}

impl FieldChange {
    fn added(path: String, local: Value) -> Self {
        Self {
            path,
            kind: ChangeKind::Added,
            local_value: Some(local),
            remote_value: None,
        }
    }

    fn removed(path: String, remote: Value) -> Self {
        Self {
            path,
            kind: ChangeKind::Removed,
            local_value: None,
            remote_value: Some(remote),
        }
    }

    fn modified(path: String, local: Value, remote: Value) -> Self {
        Self {
            path,
            kind: ChangeKind::Modified,
            local_value: Some(local),
            remote_value: Some(remote),
        }
    }
}

fn to_value<T: Serialize>(section: &str, value: &T) -> Result<Value, ConflictError> {
    serde_json::to_value(value).map_err(|e| ConflictError::Serialization {
        section: section.to_string(),
        reason: e.to_string(),
    })
}

/// Computes the ordered list of changes from `remote` to `local`
///
/// Pure: reads both snapshots, touches nothing else.
///
/// # Errors
/// Returns `ConflictError::Serialization` if a section cannot be rendered
/// as JSON.
pub fn diff_workflows(local: &Workflow, remote: &Workflow) -> Result<Vec<FieldChange>, ConflictError> {
    let mut changes = Vec::new();

    if local.name != remote.name {
        changes.push(FieldChange::modified(
            "name".to_string(),
            Value::String(local.name.clone()),
            Value::String(remote.name.clone()),
        ));
    }

    if local.active != remote.active {
        changes.push(FieldChange::modified(
            "active".to_string(),
            Value::Bool(local.active),
            Value::Bool(remote.active),
        ));
    }

    diff_nodes(&local.nodes, &remote.nodes, &mut changes)?;

    if local.connections != remote.connections {
        changes.push(FieldChange::modified(
            "connections".to_string(),
            to_value("connections", &local.connections)?,
            to_value("connections", &remote.connections)?,
        ));
    }

    if local.settings != remote.settings {
        changes.push(FieldChange::modified(
            "settings".to_string(),
            to_value("settings", &local.settings)?,
            to_value("settings", &remote.settings)?,
        ));
    }

    if local.static_data != remote.static_data {
        changes.push(FieldChange::modified(
            "staticData".to_string(),
            local.static_data.clone().unwrap_or(Value::Null),
            remote.static_data.clone().unwrap_or(Value::Null),
        ));
    }

    let keys: BTreeSet<&String> = local.extra.keys().chain(remote.extra.keys()).collect();
    for key in keys {
        let (l, r) = (local.extra.get(key), remote.extra.get(key));
        if l != r {
            changes.push(FieldChange::modified(
                key.clone(),
                l.cloned().unwrap_or(Value::Null),
                r.cloned().unwrap_or(Value::Null),
            ));
        }
    }

    Ok(changes)
}

fn diff_nodes(
    local: &[Node],
    remote: &[Node],
    changes: &mut Vec<FieldChange>,
) -> Result<(), ConflictError> {
    let remote_by_identity: HashMap<&str, &Node> =
        remote.iter().map(|n| (n.identity(), n)).collect();
    let mut matched: HashSet<&str> = HashSet::new();

    for node in local {
        let identity = node.identity();
        match remote_by_identity.get(identity) {
            Some(other) => {
                matched.insert(identity);
                diff_matched_node(node, other, changes)?;
            }
            None => changes.push(FieldChange::added(
                node_path(&node.name),
                to_value("node", node)?,
            )),
        }
    }

    for node in remote {
        if !matched.contains(node.identity()) {
            changes.push(FieldChange::removed(
                node_path(&node.name),
                to_value("node", node)?,
            ));
        }
    }

    Ok(())
}

fn node_path(name: &str) -> String {
    format!("node \"{name}\"")
}

/// Comparable attributes of a node, position and id excluded
fn node_attributes(node: &Node) -> Result<BTreeMap<String, Value>, ConflictError> {
    let mut attrs = BTreeMap::new();
    attrs.insert("name".to_string(), Value::String(node.name.clone()));
    attrs.insert("type".to_string(), Value::String(node.node_type.clone()));
    if let Some(ref version) = node.type_version {
        attrs.insert("typeVersion".to_string(), Value::Number(version.clone()));
    }
    if let Some(ref credentials) = node.credentials {
        attrs.insert("credentials".to_string(), credentials.clone());
    }
    if let Some(disabled) = node.disabled {
        attrs.insert("disabled".to_string(), Value::Bool(disabled));
    }
    for (key, value) in &node.extra {
        attrs.insert(key.clone(), value.clone());
    }
    Ok(attrs)
}

fn diff_matched_node(
    local: &Node,
    remote: &Node,
    changes: &mut Vec<FieldChange>,
) -> Result<(), ConflictError> {
    let prefix = node_path(&local.name);
    diff_maps(&prefix, &node_attributes(local)?, &node_attributes(remote)?, changes);
    diff_maps(&prefix, &local.parameters, &remote.parameters, changes);
    Ok(())
}

/// Key-by-key comparison; absent vs present is added/removed
fn diff_maps(
    prefix: &str,
    local: &BTreeMap<String, Value>,
    remote: &BTreeMap<String, Value>,
    changes: &mut Vec<FieldChange>,
) {
    let keys: BTreeSet<&String> = local.keys().chain(remote.keys()).collect();
    for key in keys {
        let path = format!("{prefix}.{key}");
        match (local.get(key), remote.get(key)) {
            (Some(l), Some(r)) if l != r => {
                changes.push(FieldChange::modified(path, l.clone(), r.clone()))
            }
            (Some(l), None) => changes.push(FieldChange::added(path, l.clone())),
            (None, Some(r)) => changes.push(FieldChange::removed(path, r.clone())),
            _ => {}
        }
    }
}
