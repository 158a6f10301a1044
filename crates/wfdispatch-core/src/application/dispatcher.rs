//! Workflow dispatcher
//!
//! Public operations of the core. Every call takes the caller's
//! [`UserContext`], resolves its namespace and delegates to the store and the
//! log aggregator. The dispatcher holds no mutable state; each call is
//! independent.

use std::sync::Arc;
use tracing::{info, info_span, Instrument};

use crate::{
    application::log_aggregator::LogAggregator,
    application::namespace_resolver::NamespaceResolver,
    application::workflow_store::WorkflowStore,
    domain::user::UserContext,
    domain::workflow::{DeletionResult, LogBundle, Workflow, WorkflowId, WorkflowSpec},
    error::DispatchResult,
};

/// Entry point composing resolver, store and aggregator
#[derive(Clone)]
pub struct WorkflowDispatcher {
    /// Identity to namespace mapping
    resolver: Arc<dyn NamespaceResolver>,

    /// Backend workflow resources
    store: WorkflowStore,

    /// Per-node log collection
    aggregator: LogAggregator,
}

impl std::fmt::Debug for WorkflowDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowDispatcher")
            .field("store", &self.store)
            .field("aggregator", &self.aggregator)
            .finish_non_exhaustive()
    }
}

impl WorkflowDispatcher {
    /// Create a new dispatcher
    pub fn new(
        resolver: Arc<dyn NamespaceResolver>,
        store: WorkflowStore,
        aggregator: LogAggregator,
    ) -> Self {
        Self {
            resolver,
            store,
            aggregator,
        }
    }

    /// Submit a workflow in the user's namespace
    pub async fn submit_workflow(&self, user: &UserContext, spec: &WorkflowSpec) -> DispatchResult<Workflow> {
        let namespace = self.resolver.resolve(user)?;
        let span = info_span!("submit_workflow", user = %user.name(), %namespace);
        async move {
            info!("Submitting workflow");
            let workflow = self.store.submit(&namespace, spec).await?;
            info!(workflow_id = %workflow.id, "Workflow submitted");
            Ok(workflow)
        }
        .instrument(span)
        .await
    }

    /// Get a workflow. Fails with `NotFound` if absent from the user's namespace.
    pub async fn get_workflow(&self, user: &UserContext, id: &WorkflowId) -> DispatchResult<Workflow> {
        let namespace = self.resolver.resolve(user)?;
        let span = info_span!("get_workflow", user = %user.name(), %namespace, workflow_id = %id);
        async move { self.store.get(&namespace, id).await }
            .instrument(span)
            .await
    }

    /// List the workflows in the user's namespace
    pub async fn list_workflows(&self, user: &UserContext) -> DispatchResult<Vec<Workflow>> {
        let namespace = self.resolver.resolve(user)?;
        let span = info_span!("list_workflows", user = %user.name(), %namespace);
        async move {
            let workflows = self.store.list(&namespace).await?;
            info!(count = workflows.len(), "Listed workflows");
            Ok(workflows)
        }
        .instrument(span)
        .await
    }

    /// Delete a workflow.
    ///
    /// Fails with `NotFound` if absent. A deletion the backend refused is
    /// reported through [`DeletionResult::status`], not as an error.
    pub async fn delete_workflow(&self, user: &UserContext, id: &WorkflowId) -> DispatchResult<DeletionResult> {
        let namespace = self.resolver.resolve(user)?;
        let span = info_span!("delete_workflow", user = %user.name(), %namespace, workflow_id = %id);
        async move {
            info!("Deleting workflow");
            let result = self.store.delete(&namespace, id).await?;
            info!(status = ?result.status, "Deletion finished");
            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// Fetch the per-node logs of a workflow.
    ///
    /// The workflow is looked up first, so a missing workflow fails with
    /// `NotFound` before any log request is issued.
    pub async fn get_logs(&self, user: &UserContext, id: &WorkflowId) -> DispatchResult<LogBundle> {
        let namespace = self.resolver.resolve(user)?;
        let span = info_span!("get_logs", user = %user.name(), %namespace, workflow_id = %id);
        async move {
            let workflow = self.store.get(&namespace, id).await?;
            let bundle = self.aggregator.fetch_logs(&namespace, &workflow).await;
            info!(
                entries = bundle.len(),
                failed = bundle.failed().count(),
                "Collected workflow logs"
            );
            Ok(bundle)
        }
        .instrument(span)
        .await
    }

    /// Check backend health
    pub async fn health_check(&self) -> DispatchResult<bool> {
        self.store.backend().health_check().await
    }
}
