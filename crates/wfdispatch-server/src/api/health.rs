//! Health check endpoint for the wfdispatch server

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::server::DispatchServer;

/// Health check handler
///
/// Reports the server as `UP` when the orchestration backend answers its
/// health probe, and answers 503 otherwise.
pub async fn health_check(State(server): State<Arc<DispatchServer>>) -> impl IntoResponse {
    debug!("Health check requested");

    let backend_status = match server.dispatcher().health_check().await {
        Ok(true) => "UP",
        Ok(false) => "DEGRADED",
        Err(err) => {
            warn!(?err, "Backend health check failed");
            "DOWN"
        }
    };

    let overall_status = if backend_status == "UP" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if overall_status == StatusCode::OK { "UP" } else { "DOWN" },
        "version": env!("CARGO_PKG_VERSION"),
        "dependencies": {
            "backend": {"status": backend_status}
        }
    });

    (overall_status, Json(response))
}
