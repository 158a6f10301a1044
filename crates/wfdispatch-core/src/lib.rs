//!
//! wfdispatch Core - Workflow lifecycle dispatching
//!
//! This crate holds the domain model and the dispatcher that submits,
//! inspects, lists and deletes workflows on behalf of an authenticated user,
//! and collects the per-node logs of a workflow. Every operation is scoped to
//! a namespace derived from the caller's identity. The orchestration backend
//! sits behind the [`OrchestrationBackend`] port.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - identity, workflow model and the backend port
pub mod domain;

/// Application services - resolver, store, log aggregation and dispatcher
pub mod application;

/// Error types
pub mod error;

/// In-memory orchestration backend
pub mod memory;

pub use error::{DispatchError, DispatchResult};

pub use domain::backend::{
    BackendDeletion, BackendLookup, BackendNode, BackendPhase, BackendWorkflow, OrchestrationBackend,
};
pub use domain::user::{escape_name, UserContext};
pub use domain::workflow::{
    DeletionResult, DeletionStatus, LogBundle, LogEntry, Namespace, NodeStatus, Workflow, WorkflowId,
    WorkflowNodes, WorkflowSpec, WorkflowStatus, MAX_RESOURCE_NAME_LEN,
};

pub use application::dispatcher::WorkflowDispatcher;
pub use application::log_aggregator::{LogAggregator, DEFAULT_LOG_CONCURRENCY, DEFAULT_LOG_CONTAINER};
pub use application::namespace_resolver::{NamespaceResolver, PrefixNamespaceResolver, MAX_NAMESPACE_LEN};
pub use application::workflow_store::{map_phase, WorkflowStore};

pub use memory::InMemoryBackend;
