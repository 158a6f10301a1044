//! Main wfdispatch server implementation
//!
//! This module contains the DispatchServer implementation.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use wfdispatch_core::WorkflowDispatcher;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::identity::IdentityExtractor;

/// Main server implementation
#[derive(Debug, Clone)]
pub struct DispatchServer {
    /// Configuration
    pub config: ServerConfig,

    /// Workflow dispatcher
    dispatcher: WorkflowDispatcher,

    /// Request identity adapter
    identity: IdentityExtractor,
}

impl DispatchServer {
    /// Create a new DispatchServer
    pub fn new(config: ServerConfig, dispatcher: WorkflowDispatcher, identity: IdentityExtractor) -> Self {
        Self {
            config,
            dispatcher,
            identity,
        }
    }

    /// Workflow dispatcher
    pub fn dispatcher(&self) -> &WorkflowDispatcher {
        &self.dispatcher
    }

    /// Request identity adapter
    pub fn identity(&self) -> &IdentityExtractor {
        &self.identity
    }

    /// Build the HTTP router for this server
    pub fn router(self) -> axum::Router {
        crate::api::build_router(Arc::new(self))
    }

    /// Run the server until ctrl-c
    pub async fn run(self) -> ServerResult<()> {
        info!("Starting wfdispatch server");

        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| ServerError::ConfigError(format!("Invalid bind address: {}", e)))?;
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);

        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(?err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
