use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    domain::backend::{BackendDeletion, BackendLookup, BackendPhase, BackendWorkflow, OrchestrationBackend},
    domain::workflow::{
        DeletionResult, Namespace, NodeStatus, Workflow, WorkflowId, WorkflowNodes, WorkflowSpec,
        WorkflowStatus,
    },
    error::{DispatchError, DispatchResult},
};

/// Store translating backend workflow resources into the domain model
#[derive(Debug, Clone)]
pub struct WorkflowStore {
    /// Orchestration backend client
    backend: Arc<dyn OrchestrationBackend>,
}

impl WorkflowStore {
    /// Create a new workflow store
    pub fn new(backend: Arc<dyn OrchestrationBackend>) -> Self {
        Self { backend }
    }

    /// The backend this store talks to
    pub fn backend(&self) -> &Arc<dyn OrchestrationBackend> {
        &self.backend
    }

    /// Submit a workflow spec. The returned workflow carries the backend-assigned ID.
    pub async fn submit(&self, namespace: &Namespace, spec: &WorkflowSpec) -> DispatchResult<Workflow> {
        let created = self.backend.submit(namespace, spec).await?;
        // A resource the controller has not picked up yet has no phase and maps to Pending
        let workflow = to_workflow(namespace, created)?;
        debug!(workflow_id = %workflow.id, "Workflow created");
        Ok(workflow)
    }

    /// Fetch the current state of a workflow
    pub async fn get(&self, namespace: &Namespace, id: &WorkflowId) -> DispatchResult<Workflow> {
        ensure_resource_name(id)?;
        match self.backend.get(namespace, id).await? {
            BackendLookup::Found(found) => to_workflow(namespace, found).map_err(|_| not_found(id)),
            BackendLookup::Missing => Err(not_found(id)),
        }
    }

    /// List the workflows of a namespace
    pub async fn list(&self, namespace: &Namespace) -> DispatchResult<Vec<Workflow>> {
        let found = self.backend.list(namespace).await?;
        let mut workflows = Vec::with_capacity(found.len());
        for item in found {
            match to_workflow(namespace, item) {
                Ok(workflow) => workflows.push(workflow),
                Err(err) => warn!(?err, "Dropping workflow from foreign namespace"),
            }
        }
        Ok(workflows)
    }

    /// Delete a workflow. Deleting an absent workflow fails with `NotFound`.
    pub async fn delete(&self, namespace: &Namespace, id: &WorkflowId) -> DispatchResult<DeletionResult> {
        ensure_resource_name(id)?;
        match self.backend.delete(namespace, id).await? {
            BackendDeletion::Deleted => Ok(DeletionResult::success(id.as_str())),
            BackendDeletion::Rejected(reason) => {
                warn!(workflow_id = %id, %reason, "Backend rejected deletion");
                Ok(DeletionResult::failed(id.as_str(), reason))
            }
            BackendDeletion::Missing => Err(not_found(id)),
        }
    }
}

fn not_found(id: &WorkflowId) -> DispatchError {
    DispatchError::NotFound(id.to_string())
}

/// IDs that are not resource names never reach the backend
fn ensure_resource_name(id: &WorkflowId) -> DispatchResult<()> {
    if id.is_resource_name() {
        Ok(())
    } else {
        warn!(workflow_id = %id, "Rejecting workflow ID that is not a resource name");
        Err(not_found(id))
    }
}

/// Map a backend phase to the domain status
pub fn map_phase(phase: &BackendPhase) -> WorkflowStatus {
    match phase {
        BackendPhase::Unset | BackendPhase::Pending | BackendPhase::Unknown(_) => WorkflowStatus::Pending,
        BackendPhase::Running => WorkflowStatus::Running,
        BackendPhase::Succeeded | BackendPhase::Skipped | BackendPhase::Omitted => WorkflowStatus::Succeeded,
        BackendPhase::Failed | BackendPhase::Error => WorkflowStatus::Failed,
    }
}

/// Map a backend workflow into the domain model.
///
/// Fails with `NotFound` when the object belongs to another namespace.
fn to_workflow(namespace: &Namespace, found: BackendWorkflow) -> DispatchResult<Workflow> {
    if found.namespace != namespace.as_str() {
        return Err(DispatchError::NotFound(found.name));
    }

    let status = if found.deleted_at.is_some() {
        WorkflowStatus::Deleted
    } else {
        map_phase(&found.phase)
    };

    let nodes: WorkflowNodes = found
        .nodes
        .into_iter()
        .map(|node| {
            let status = NodeStatus {
                pod_id: node.pod_name,
                phase: map_phase(&node.phase),
            };
            (node.id, status)
        })
        .collect();

    Ok(Workflow {
        id: WorkflowId(found.name),
        namespace: namespace.clone(),
        status,
        nodes,
        created_at: found.created_at,
    })
}
