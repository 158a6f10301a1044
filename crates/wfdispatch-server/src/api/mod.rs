//! API module for the wfdispatch server
//!
//! This module contains the API routes and handlers.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod errors;
pub mod health;
pub mod workflows;

use crate::server::DispatchServer;

/// Build the router for API endpoints
pub fn build_router(server: Arc<DispatchServer>) -> Router {
    Router::new()
        // Workflow lifecycle
        .route(
            "/api/v1/workflows",
            post(workflows::submit_workflow_handler).get(workflows::list_workflows_handler),
        )
        .route(
            "/api/v1/workflows/:workflow_id",
            get(workflows::get_workflow_handler).delete(workflows::delete_workflow_handler),
        )
        .route("/api/v1/workflows/:workflow_id/logs", get(workflows::workflow_logs_handler))
        // Health check
        .route("/health", get(health::health_check))
        .layer(TraceLayer::new_for_http())
        // Shared state
        .with_state(server)
}

pub use errors::ApiError;
