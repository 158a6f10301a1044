//! In-memory orchestration backend
//!
//! Used for local development (`memory://` backend URL) and tests. Workflow
//! IDs are assigned sequentially (`wf-1`, `wf-2`, ...). The backend never
//! advances phases on its own; callers drive transitions through the
//! `set_*`/`add_node` hooks to simulate the orchestrator.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

use crate::{
    domain::backend::{BackendDeletion, BackendLookup, BackendNode, BackendPhase, BackendWorkflow, OrchestrationBackend},
    domain::workflow::{Namespace, WorkflowId, WorkflowSpec},
    error::{DispatchError, DispatchResult},
};

type Key = (String, String);

fn key(namespace: &Namespace, name: &str) -> Key {
    (namespace.as_str().to_string(), name.to_string())
}

#[derive(Debug, Clone)]
struct StoredWorkflow {
    seq: u64,
    spec: WorkflowSpec,
    resource: BackendWorkflow,
}

#[derive(Debug, Clone)]
enum StoredLog {
    Text(String),
    Failing(String),
}

/// Orchestration backend kept entirely in process memory
#[derive(Debug)]
pub struct InMemoryBackend {
    workflows: DashMap<Key, StoredWorkflow>,
    logs: DashMap<Key, StoredLog>,
    rejections: DashMap<Key, String>,
    next_id: AtomicU64,
    healthy: AtomicBool,
}

impl InMemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self {
            workflows: DashMap::with_capacity(16),
            logs: DashMap::new(),
            rejections: DashMap::new(),
            next_id: AtomicU64::new(1),
            healthy: AtomicBool::new(true),
        }
    }

    /// Whether a workflow exists
    pub fn contains(&self, namespace: &Namespace, id: &str) -> bool {
        self.workflows.contains_key(&key(namespace, id))
    }

    /// Spec a workflow was submitted with
    pub fn submitted_spec(&self, namespace: &Namespace, id: &str) -> Option<WorkflowSpec> {
        self.workflows.get(&key(namespace, id)).map(|stored| stored.spec.clone())
    }

    /// Set the workflow phase. Returns false if the workflow does not exist.
    pub fn set_phase(&self, namespace: &Namespace, id: &str, phase: BackendPhase) -> bool {
        match self.workflows.get_mut(&key(namespace, id)) {
            Some(mut stored) => {
                stored.resource.phase = phase;
                true
            }
            None => false,
        }
    }

    /// Append a node (or update it in place). The node's pod shares its ID.
    pub fn add_node(&self, namespace: &Namespace, id: &str, node_id: &str, phase: BackendPhase) -> bool {
        match self.workflows.get_mut(&key(namespace, id)) {
            Some(mut stored) => {
                let nodes = &mut stored.resource.nodes;
                match nodes.iter_mut().find(|node| node.id == node_id) {
                    Some(node) => node.phase = phase,
                    None => nodes.push(BackendNode {
                        id: node_id.to_string(),
                        pod_name: node_id.to_string(),
                        phase,
                    }),
                }
                true
            }
            None => false,
        }
    }

    /// Set the log text of a pod's container
    pub fn set_log(&self, namespace: &Namespace, pod_name: &str, logs: impl Into<String>) {
        self.logs.insert(key(namespace, pod_name), StoredLog::Text(logs.into()));
    }

    /// Make log reads for a pod fail
    pub fn fail_log(&self, namespace: &Namespace, pod_name: &str, reason: impl Into<String>) {
        self.logs.insert(key(namespace, pod_name), StoredLog::Failing(reason.into()));
    }

    /// Make the next deletion of a workflow be refused
    pub fn reject_deletion(&self, namespace: &Namespace, id: &str, reason: impl Into<String>) {
        self.rejections.insert(key(namespace, id), reason.into());
    }

    /// Flip the health flag
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    fn has_pod(&self, namespace: &Namespace, pod_name: &str) -> bool {
        self.workflows.iter().any(|entry| {
            entry.key().0 == namespace.as_str()
                && entry.resource.nodes.iter().any(|node| node.pod_name == pod_name)
        })
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrchestrationBackend for InMemoryBackend {
    async fn submit(&self, namespace: &Namespace, spec: &WorkflowSpec) -> DispatchResult<BackendWorkflow> {
        spec.check_shape().map_err(DispatchError::Configuration)?;
        let seq = self.next_id.fetch_add(1, Ordering::SeqCst);
        let name = format!("wf-{}", seq);
        let resource = BackendWorkflow {
            name: name.clone(),
            namespace: namespace.as_str().to_string(),
            phase: BackendPhase::Unset,
            nodes: Vec::new(),
            created_at: Some(Utc::now()),
            deleted_at: None,
        };

        self.workflows.insert(
            key(namespace, &name),
            StoredWorkflow {
                seq,
                spec: spec.clone(),
                resource: resource.clone(),
            },
        );
        debug!(%namespace, %name, "Stored workflow");
        Ok(resource)
    }

    async fn get(&self, namespace: &Namespace, id: &WorkflowId) -> DispatchResult<BackendLookup> {
        Ok(match self.workflows.get(&key(namespace, id.as_str())) {
            Some(stored) => BackendLookup::Found(stored.resource.clone()),
            None => BackendLookup::Missing,
        })
    }

    async fn list(&self, namespace: &Namespace) -> DispatchResult<Vec<BackendWorkflow>> {
        let mut found: Vec<(u64, BackendWorkflow)> = self
            .workflows
            .iter()
            .filter(|entry| entry.key().0 == namespace.as_str())
            .map(|entry| (entry.seq, entry.resource.clone()))
            .collect();
        found.sort_by_key(|(seq, _)| *seq);
        Ok(found.into_iter().map(|(_, resource)| resource).collect())
    }

    async fn delete(&self, namespace: &Namespace, id: &WorkflowId) -> DispatchResult<BackendDeletion> {
        let entry_key = key(namespace, id.as_str());
        if !self.workflows.contains_key(&entry_key) {
            return Ok(BackendDeletion::Missing);
        }
        if let Some((_, reason)) = self.rejections.remove(&entry_key) {
            return Ok(BackendDeletion::Rejected(reason));
        }
        self.workflows.remove(&entry_key);
        Ok(BackendDeletion::Deleted)
    }

    async fn read_log(&self, namespace: &Namespace, pod_name: &str, _container: &str) -> DispatchResult<String> {
        let stored = self.logs.get(&key(namespace, pod_name)).map(|entry| entry.value().clone());
        match stored {
            Some(StoredLog::Text(text)) => Ok(text),
            Some(StoredLog::Failing(reason)) => Err(DispatchError::BackendUnavailable(reason)),
            None if self.has_pod(namespace, pod_name) => Ok(String::new()),
            None => Err(DispatchError::NotFound(format!("pod {}", pod_name))),
        }
    }

    async fn health_check(&self) -> DispatchResult<bool> {
        Ok(self.healthy.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns() -> Namespace {
        Namespace("nublado-alice".to_string())
    }

    #[tokio::test]
    async fn test_sequential_ids() {
        let backend = InMemoryBackend::new();
        let spec = WorkflowSpec::new(serde_json::json!({}));
        let first = backend.submit(&ns(), &spec).await.unwrap();
        let second = backend.submit(&ns(), &spec).await.unwrap();
        assert_eq!(first.name, "wf-1");
        assert_eq!(second.name, "wf-2");
        assert_eq!(first.phase, BackendPhase::Unset);
    }

    #[tokio::test]
    async fn test_submit_rejects_non_object_spec() {
        let backend = InMemoryBackend::new();
        let err = backend
            .submit(&ns(), &WorkflowSpec::new(serde_json::json!([1, 2])))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Configuration(_)));
        assert!(!backend.contains(&ns(), "wf-1"));
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let backend = InMemoryBackend::new();
        let spec = WorkflowSpec::new(serde_json::json!({}));
        backend.submit(&ns(), &spec).await.unwrap();

        let other = Namespace("nublado-bob".to_string());
        let lookup = backend.get(&other, &WorkflowId::from("wf-1")).await.unwrap();
        assert_eq!(lookup, BackendLookup::Missing);
        assert!(backend.list(&other).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_then_missing() {
        let backend = InMemoryBackend::new();
        let spec = WorkflowSpec::new(serde_json::json!({}));
        backend.submit(&ns(), &spec).await.unwrap();
        let id = WorkflowId::from("wf-1");

        assert_eq!(backend.delete(&ns(), &id).await.unwrap(), BackendDeletion::Deleted);
        assert_eq!(backend.delete(&ns(), &id).await.unwrap(), BackendDeletion::Missing);
    }

    #[tokio::test]
    async fn test_read_log_states() {
        let backend = InMemoryBackend::new();
        let spec = WorkflowSpec::new(serde_json::json!({}));
        backend.submit(&ns(), &spec).await.unwrap();
        backend.add_node(&ns(), "wf-1", "wf-1-a", BackendPhase::Running);
        backend.add_node(&ns(), "wf-1", "wf-1-b", BackendPhase::Running);
        backend.set_log(&ns(), "wf-1-a", "step a\n");
        backend.fail_log(&ns(), "wf-1-b", "container not ready");

        assert_eq!(backend.read_log(&ns(), "wf-1-a", "main").await.unwrap(), "step a\n");
        assert!(backend.read_log(&ns(), "wf-1-b", "main").await.unwrap_err().is_backend_error());
        assert!(backend.read_log(&ns(), "nope", "main").await.unwrap_err().is_not_found());
    }
}
