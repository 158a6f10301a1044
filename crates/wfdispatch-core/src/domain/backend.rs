//! Orchestration backend port
//!
//! This module defines the narrow interface the dispatcher uses to reach the
//! container orchestrator, and the explicit representation backends return.
//! Backend-native objects are translated into these types by the adapter and
//! into the domain model by the [`WorkflowStore`](crate::WorkflowStore); they
//! never cross the dispatcher boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

use super::workflow::{Namespace, WorkflowId, WorkflowSpec};
use crate::error::DispatchResult;

/// Phase as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendPhase {
    /// No phase reported yet
    Unset,
    /// Waiting to be scheduled
    Pending,
    /// Executing
    Running,
    /// Finished successfully
    Succeeded,
    /// Skipped by a conditional
    Skipped,
    /// Omitted from the graph
    Omitted,
    /// Finished with a failure
    Failed,
    /// Finished with an infrastructure error
    Error,
    /// Any phase this adapter does not know
    Unknown(String),
}

impl BackendPhase {
    /// Parse a backend phase string
    pub fn parse(phase: Option<&str>) -> Self {
        match phase {
            None | Some("") => BackendPhase::Unset,
            Some("Pending") => BackendPhase::Pending,
            Some("Running") => BackendPhase::Running,
            Some("Succeeded") => BackendPhase::Succeeded,
            Some("Skipped") => BackendPhase::Skipped,
            Some("Omitted") => BackendPhase::Omitted,
            Some("Failed") => BackendPhase::Failed,
            Some("Error") => BackendPhase::Error,
            Some(other) => BackendPhase::Unknown(other.to_string()),
        }
    }
}

/// A workflow node as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendNode {
    /// Node identifier
    pub id: String,
    /// Pod backing the node
    pub pod_name: String,
    /// Node phase
    pub phase: BackendPhase,
}

/// A workflow object as reported by the backend
#[derive(Debug, Clone, PartialEq)]
pub struct BackendWorkflow {
    /// Backend name of the workflow resource
    pub name: String,
    /// Namespace the resource lives in
    pub namespace: String,
    /// Workflow phase
    pub phase: BackendPhase,
    /// Nodes in enumeration order
    pub nodes: Vec<BackendNode>,
    /// Creation timestamp
    pub created_at: Option<DateTime<Utc>>,
    /// Set once the backend has started deleting the resource
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Result of looking a workflow up
#[derive(Debug, Clone, PartialEq)]
pub enum BackendLookup {
    /// The workflow exists
    Found(BackendWorkflow),
    /// No such workflow in the namespace
    Missing,
}

/// Result of a delete request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendDeletion {
    /// The backend accepted the deletion
    Deleted,
    /// The backend answered but refused to delete
    Rejected(String),
    /// No such workflow in the namespace
    Missing,
}

/// Interface for orchestration backend operations
///
/// Implementations surface transport faults as
/// [`DispatchError::BackendUnavailable`](crate::DispatchError::BackendUnavailable)
/// and never retry internally.
#[async_trait]
pub trait OrchestrationBackend: Send + Sync + Debug {
    /// Create a workflow from an opaque spec
    async fn submit(&self, namespace: &Namespace, spec: &WorkflowSpec) -> DispatchResult<BackendWorkflow>;

    /// Fetch a workflow
    async fn get(&self, namespace: &Namespace, id: &WorkflowId) -> DispatchResult<BackendLookup>;

    /// List workflows in a namespace. An unknown namespace yields an empty list.
    async fn list(&self, namespace: &Namespace) -> DispatchResult<Vec<BackendWorkflow>>;

    /// Delete a workflow
    async fn delete(&self, namespace: &Namespace, id: &WorkflowId) -> DispatchResult<BackendDeletion>;

    /// Read the log stream of one container of a pod
    async fn read_log(&self, namespace: &Namespace, pod_name: &str, container: &str) -> DispatchResult<String>;

    /// Get health status
    async fn health_check(&self) -> DispatchResult<bool>;
}
