use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    domain::backend::OrchestrationBackend,
    domain::workflow::{LogBundle, LogEntry, Namespace, Workflow},
};

/// Container whose logs are collected by default
pub const DEFAULT_LOG_CONTAINER: &str = "main";

/// Default number of node log fetches in flight
pub const DEFAULT_LOG_CONCURRENCY: usize = 4;

/// Collects the per-node logs of a workflow
#[derive(Debug, Clone)]
pub struct LogAggregator {
    /// Orchestration backend client
    backend: Arc<dyn OrchestrationBackend>,

    /// Container name to read logs from
    container: String,

    /// Fetches in flight at once; 1 means sequential
    max_concurrency: usize,
}

impl LogAggregator {
    /// Create a log aggregator reading the `main` container
    pub fn new(backend: Arc<dyn OrchestrationBackend>) -> Self {
        Self {
            backend,
            container: DEFAULT_LOG_CONTAINER.to_string(),
            max_concurrency: DEFAULT_LOG_CONCURRENCY,
        }
    }

    /// Read logs from another container
    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }

    /// Bound the number of concurrent fetches. Zero is treated as one.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Fetch the logs of every node of `workflow`.
    ///
    /// Entries come back in node enumeration order. A node whose fetch fails
    /// still gets an entry, with empty `logs` and the failure in `error`.
    pub async fn fetch_logs(&self, namespace: &Namespace, workflow: &Workflow) -> LogBundle {
        if workflow.nodes.is_empty() {
            return LogBundle::default();
        }

        let pods: Vec<(String, String)> = workflow
            .nodes
            .iter()
            .map(|(node_id, node)| (node_id.to_string(), node.pod_id.clone()))
            .collect();

        // Each fetch owns its inputs so the stream stays Send for any caller
        let fetches = pods.into_iter().map(|(node_id, pod_id)| {
            let backend = Arc::clone(&self.backend);
            let namespace = namespace.clone();
            let container = self.container.clone();
            async move {
                debug!(%node_id, pod = %pod_id, "Fetching node logs");
                match backend.read_log(&namespace, &pod_id, &container).await {
                    Ok(logs) => LogEntry::fetched(pod_id, logs),
                    Err(err) => {
                        warn!(?err, %node_id, pod = %pod_id, "Failed to fetch node logs");
                        LogEntry::failed(pod_id, err.to_string())
                    }
                }
            }
        });

        // buffered() yields in input order whatever the completion order
        let entries: Vec<LogEntry> = stream::iter(fetches)
            .buffered(self.max_concurrency)
            .collect()
            .await;

        LogBundle(entries)
    }
}
