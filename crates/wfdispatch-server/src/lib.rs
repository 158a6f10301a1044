//!
//! wfdispatch Server - HTTP front end for the workflow dispatcher
//!
//! This crate wires the dispatcher core to an HTTP API, the Argo Workflows
//! backend and the gateway identity header.

// External dependencies
use std::sync::Arc;
use std::time::Duration;

use wfdispatch_core::{
    InMemoryBackend, LogAggregator, OrchestrationBackend, PrefixNamespaceResolver, WorkflowDispatcher,
    WorkflowStore,
};

/// API module
pub mod api;

/// Orchestration backend adapters
pub mod backend;

/// Configuration module
pub mod config;

/// Error module
pub mod error;

/// Identity adapter module
pub mod identity;

/// Server module
pub mod server;

// Re-export key types
pub use backend::ArgoBackend;
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use identity::{AuthenticatedUser, IdentityExtractor};
pub use server::DispatchServer;

/// Run function
pub async fn run(config: ServerConfig) -> ServerResult<()> {
    // Initialize logging
    init_logging(&config);

    let backend = create_backend(&config)?;
    let server = build_server(config, backend);

    server.run().await
}

/// Initialize logging
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &ServerConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let result = if config.log_json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_target(true)
            .try_init()
    } else {
        fmt().with_env_filter(filter).with_target(true).try_init()
    };

    if let Err(err) = result {
        tracing::warn!(%err, "Logging was already initialized");
    }
}

/// Create the orchestration backend named by `backend_url`
pub fn create_backend(config: &ServerConfig) -> ServerResult<Arc<dyn OrchestrationBackend>> {
    if config.uses_memory_backend() {
        // Use in-memory backend for development and testing
        tracing::info!("Using in-memory orchestration backend");
        return Ok(Arc::new(InMemoryBackend::new()));
    }

    if config.backend_url.starts_with("http://") || config.backend_url.starts_with("https://") {
        tracing::info!(
            backend_url = %config.backend_url,
            kube_api_url = %config.kube_api_url(),
            "Using Argo Workflows backend"
        );
        let backend = ArgoBackend::new(
            config.backend_url.clone(),
            config.kube_api_url().to_string(),
            config.backend_token.clone(),
            Duration::from_secs(config.request_timeout_seconds),
        )?;
        return Ok(Arc::new(backend));
    }

    Err(ServerError::ConfigError(format!(
        "Unsupported backend URL: {}",
        config.backend_url
    )))
}

/// Assemble the dispatcher for `backend` from the configuration
pub fn create_dispatcher(config: &ServerConfig, backend: Arc<dyn OrchestrationBackend>) -> WorkflowDispatcher {
    let mut resolver = PrefixNamespaceResolver::new(config.namespace_prefix.clone());
    if let Some(group) = &config.required_group {
        resolver = resolver.with_required_group(group.clone());
    }

    let aggregator = LogAggregator::new(backend.clone())
        .with_container(config.log_container.clone())
        .with_max_concurrency(config.log_fetch_concurrency);

    WorkflowDispatcher::new(Arc::new(resolver), WorkflowStore::new(backend), aggregator)
}

/// Build a server around an already created backend
pub fn build_server(config: ServerConfig, backend: Arc<dyn OrchestrationBackend>) -> DispatchServer {
    let dispatcher = create_dispatcher(&config, backend);
    let identity = IdentityExtractor::from_config(&config);
    DispatchServer::new(config, dispatcher, identity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(backend_url: &str) -> ServerConfig {
        ServerConfig {
            backend_url: backend_url.to_string(),
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_memory_backend_selected() {
        let backend = create_backend(&config("memory://")).unwrap();
        assert!(backend.health_check().await.unwrap());
    }

    #[test]
    fn test_http_backend_selected() {
        assert!(create_backend(&config("https://argo.example.com")).is_ok());
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        let err = create_backend(&config("redis://localhost")).unwrap_err();
        assert!(matches!(err, ServerError::ConfigError(_)));
    }
}
