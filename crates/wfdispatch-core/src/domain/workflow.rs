use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Value object: Namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(pub String);

impl Namespace {
    /// Borrow the namespace name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value object: Workflow ID, assigned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    /// Borrow the workflow ID
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the ID is a valid resource name (RFC 1123 subdomain).
    ///
    /// Backends never assign anything else, so an ID failing this check
    /// cannot name a workflow in any namespace.
    pub fn is_resource_name(&self) -> bool {
        self.0.len() <= MAX_RESOURCE_NAME_LEN && self.0.split('.').all(is_dns_label)
    }
}

/// Longest name a backend resource may carry
pub const MAX_RESOURCE_NAME_LEN: usize = 253;

fn is_dns_label(label: &str) -> bool {
    !label.is_empty()
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkflowId {
    fn from(id: &str) -> Self {
        WorkflowId(id.to_string())
    }
}

/// Workflow status, also used at node granularity
///
/// `Pending -> Running -> {Succeeded, Failed}`, with `Deleted` reachable from
/// any state. Transitions are driven by the backend only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowStatus {
    /// Accepted, not yet scheduled
    Pending,
    /// At least one node is executing
    Running,
    /// Completed without error
    Succeeded,
    /// Completed with an error
    Failed,
    /// Deletion in progress or done
    Deleted,
}

impl WorkflowStatus {
    /// Whether no further transitions are expected
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Succeeded | WorkflowStatus::Failed | WorkflowStatus::Deleted
        )
    }
}

/// Per-node status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Backend execution unit (pod) backing this node
    pub pod_id: String,
    /// Node phase
    pub phase: WorkflowStatus,
}

/// Nodes keyed by node ID, in backend enumeration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "serde_json::Map<String, serde_json::Value>")]
pub struct WorkflowNodes {
    entries: Vec<(String, NodeStatus)>,
}

impl WorkflowNodes {
    /// Create an empty node map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node. An existing ID keeps its position and gets the new status.
    pub fn insert(&mut self, node_id: impl Into<String>, status: NodeStatus) {
        let node_id = node_id.into();
        match self.entries.iter_mut().find(|(id, _)| *id == node_id) {
            Some((_, existing)) => *existing = status,
            None => self.entries.push((node_id, status)),
        }
    }

    /// Look up a node by ID
    pub fn get(&self, node_id: &str) -> Option<&NodeStatus> {
        self.entries
            .iter()
            .find(|(id, _)| id == node_id)
            .map(|(_, status)| status)
    }

    /// Iterate nodes in enumeration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeStatus)> {
        self.entries.iter().map(|(id, status)| (id.as_str(), status))
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no nodes
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, NodeStatus)> for WorkflowNodes {
    fn from_iter<I: IntoIterator<Item = (String, NodeStatus)>>(iter: I) -> Self {
        let mut nodes = WorkflowNodes::new();
        for (id, status) in iter {
            nodes.insert(id, status);
        }
        nodes
    }
}

impl TryFrom<serde_json::Map<String, serde_json::Value>> for WorkflowNodes {
    type Error = serde_json::Error;

    fn try_from(map: serde_json::Map<String, serde_json::Value>) -> Result<Self, Self::Error> {
        map.into_iter()
            .map(|(id, value)| serde_json::from_value::<NodeStatus>(value).map(|status| (id, status)))
            .collect()
    }
}

impl Serialize for WorkflowNodes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, status) in &self.entries {
            map.serialize_entry(id, status)?;
        }
        map.end()
    }
}

/// Aggregate: a submitted workflow as observed on the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Backend-assigned identifier
    pub id: WorkflowId,

    /// Namespace the workflow lives in
    pub namespace: Namespace,

    /// Current status
    pub status: WorkflowStatus,

    /// Node statuses in enumeration order
    pub nodes: WorkflowNodes,

    /// Creation timestamp, when the backend reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Opaque workflow specification forwarded to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowSpec(pub serde_json::Value);

impl WorkflowSpec {
    /// Wrap a JSON document
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Borrow the underlying document
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Check that the document has the shape of a workflow manifest: an
    /// object whose `metadata`, `metadata.labels` and `metadata.annotations`
    /// are objects when present.
    pub fn check_shape(&self) -> Result<(), String> {
        let manifest = self
            .0
            .as_object()
            .ok_or_else(|| "workflow spec must be a JSON object".to_string())?;

        let metadata = match manifest.get("metadata") {
            None => return Ok(()),
            Some(metadata) => metadata
                .as_object()
                .ok_or_else(|| "workflow metadata must be a JSON object".to_string())?,
        };

        for key in ["labels", "annotations"] {
            if metadata.get(key).map_or(false, |value| !value.is_object()) {
                return Err(format!("workflow metadata.{} must be a JSON object", key));
            }
        }
        Ok(())
    }
}

/// Outcome of a deletion the backend accepted or rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionStatus {
    /// The backend deleted the workflow
    Success,
    /// The backend refused the deletion
    Failed,
}

/// Result of `delete_workflow`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionResult {
    /// Success or backend-reported failure
    pub status: DeletionStatus,
    /// Workflow ID the deletion was issued for
    pub name: String,
    /// Backend-reported reason on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DeletionResult {
    /// Successful deletion of `name`
    pub fn success(name: impl Into<String>) -> Self {
        Self {
            status: DeletionStatus::Success,
            name: name.into(),
            message: None,
        }
    }

    /// Rejected deletion of `name`
    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: DeletionStatus::Failed,
            name: name.into(),
            message: Some(message.into()),
        }
    }
}

/// Logs of a single node's main container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Pod the logs came from
    pub name: String,
    /// Log text; empty when the fetch failed
    pub logs: String,
    /// Fetch failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LogEntry {
    /// Entry for a successful fetch
    pub fn fetched(name: impl Into<String>, logs: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            logs: logs.into(),
            error: None,
        }
    }

    /// Sentinel entry for a failed fetch
    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            logs: String::new(),
            error: Some(error.into()),
        }
    }

    /// Whether this entry is a failure sentinel
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Per-node logs of a workflow, in node enumeration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogBundle(pub Vec<LogEntry>);

impl LogBundle {
    /// Entries in node order
    pub fn entries(&self) -> &[LogEntry] {
        &self.0
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bundle is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries whose fetch failed
    pub fn failed(&self) -> impl Iterator<Item = &LogEntry> {
        self.0.iter().filter(|entry| entry.is_failed())
    }

    /// Whether any entry failed
    pub fn is_partial(&self) -> bool {
        self.0.iter().any(LogEntry::is_failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(pod: &str, phase: WorkflowStatus) -> NodeStatus {
        NodeStatus {
            pod_id: pod.to_string(),
            phase,
        }
    }

    #[test]
    fn test_nodes_keep_insertion_order() {
        let mut nodes = WorkflowNodes::new();
        nodes.insert("zeta", node("zeta", WorkflowStatus::Running));
        nodes.insert("alpha", node("alpha", WorkflowStatus::Pending));
        nodes.insert("mid", node("mid", WorkflowStatus::Succeeded));

        let ids: Vec<&str> = nodes.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_nodes_reinsert_keeps_position() {
        let mut nodes = WorkflowNodes::new();
        nodes.insert("a", node("a", WorkflowStatus::Running));
        nodes.insert("b", node("b", WorkflowStatus::Running));
        nodes.insert("a", node("a", WorkflowStatus::Failed));

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes.iter().next().unwrap().0, "a");
        assert_eq!(nodes.get("a").unwrap().phase, WorkflowStatus::Failed);
    }

    #[test]
    fn test_nodes_serialize_as_ordered_object() {
        let mut nodes = WorkflowNodes::new();
        nodes.insert("wf-1-b", node("wf-1-b", WorkflowStatus::Running));
        nodes.insert("wf-1-a", node("wf-1-a", WorkflowStatus::Pending));

        let text = serde_json::to_string(&nodes).unwrap();
        assert!(text.find("wf-1-b").unwrap() < text.find("wf-1-a").unwrap());

        let back: WorkflowNodes = serde_json::from_str(&text).unwrap();
        assert_eq!(back, nodes);
    }

    #[test]
    fn test_nodes_reject_malformed_entry() {
        let text = r#"{"wf-1-a": {"pod_id": "wf-1-a", "phase": "Running"}, "wf-1-b": {"phase": 7}}"#;
        assert!(serde_json::from_str::<WorkflowNodes>(text).is_err());
    }

    #[test]
    fn test_resource_name_check() {
        for valid in ["wf-1", "wf-nublado-alice-x7k2p", "a.b-c", "0"] {
            assert!(WorkflowId::from(valid).is_resource_name(), "{} should be valid", valid);
        }
        for invalid in [
            "",
            "..",
            "../nublado-bob/wf-1",
            "wf-1/logs",
            "WF-1",
            "-wf",
            "wf..1",
            "wf%2F1",
        ] {
            assert!(!WorkflowId::from(invalid).is_resource_name(), "{} should be invalid", invalid);
        }
        assert!(!WorkflowId("a".repeat(254)).is_resource_name());
    }

    #[test]
    fn test_spec_shape() {
        assert!(WorkflowSpec::new(json!({})).check_shape().is_ok());
        assert!(WorkflowSpec::new(json!({"metadata": {"labels": {"a": "b"}}})).check_shape().is_ok());

        let err = WorkflowSpec::new(json!([1, 2])).check_shape().unwrap_err();
        assert!(err.contains("JSON object"));
        assert!(WorkflowSpec::new(json!({"metadata": "x"})).check_shape().is_err());
        let err = WorkflowSpec::new(json!({"metadata": {"annotations": []}}))
            .check_shape()
            .unwrap_err();
        assert!(err.contains("metadata.annotations"));
    }

    #[test]
    fn test_workflow_json_shape() {
        let workflow = Workflow {
            id: WorkflowId::from("wf-1"),
            namespace: Namespace("nublado-alice".to_string()),
            status: WorkflowStatus::Pending,
            nodes: WorkflowNodes::new(),
            created_at: None,
        };

        let value = serde_json::to_value(&workflow).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "wf-1",
                "namespace": "nublado-alice",
                "status": "Pending",
                "nodes": {}
            })
        );
    }

    #[test]
    fn test_deletion_result_shape() {
        let value = serde_json::to_value(DeletionResult::success("wf-1")).unwrap();
        assert_eq!(value, json!({"status": "Success", "name": "wf-1"}));

        let failed = DeletionResult::failed("wf-2", "finalizer pending");
        assert_eq!(failed.status, DeletionStatus::Failed);
        assert_eq!(failed.message.as_deref(), Some("finalizer pending"));
    }

    #[test]
    fn test_log_bundle_partial() {
        let bundle = LogBundle(vec![
            LogEntry::fetched("pod-a", "hello\n"),
            LogEntry::failed("pod-b", "connection reset"),
        ]);

        assert_eq!(bundle.len(), 2);
        assert!(bundle.is_partial());
        let failed: Vec<&str> = bundle.failed().map(|e| e.name.as_str()).collect();
        assert_eq!(failed, vec!["pod-b"]);
        assert_eq!(bundle.entries()[1].logs, "");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!WorkflowStatus::Pending.is_terminal());
        assert!(!WorkflowStatus::Running.is_terminal());
        assert!(WorkflowStatus::Succeeded.is_terminal());
        assert!(WorkflowStatus::Failed.is_terminal());
        assert!(WorkflowStatus::Deleted.is_terminal());
    }
}
