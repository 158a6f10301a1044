//! Workflow API
//!
//! Handlers for the workflow lifecycle endpoints. Every handler runs as the
//! caller identified by [`AuthenticatedUser`].

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

use wfdispatch_core::{WorkflowId, WorkflowSpec};

use crate::api::errors::ApiError;
use crate::identity::AuthenticatedUser;
use crate::server::DispatchServer;

/// Parse a submission body as JSON, or YAML when the content type says so
pub fn parse_spec(headers: &HeaderMap, body: &[u8]) -> Result<WorkflowSpec, ApiError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/json");

    let value: Value = if is_yaml(content_type) {
        serde_yaml::from_slice(body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid YAML workflow: {}", e)))?
    } else {
        serde_json::from_slice(body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON workflow: {}", e)))?
    };

    let spec = WorkflowSpec::new(value);
    spec.check_shape().map_err(ApiError::BadRequest)?;
    Ok(spec)
}

fn is_yaml(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    matches!(mime, "application/yaml" | "application/x-yaml" | "text/yaml")
}

/// Handler for submitting a workflow
pub async fn submit_workflow_handler(
    State(server): State<Arc<DispatchServer>>,
    AuthenticatedUser(user): AuthenticatedUser,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let spec = match parse_spec(&headers, &body) {
        Ok(spec) => spec,
        Err(err) => return err.into_response(),
    };

    match server.dispatcher().submit_workflow(&user, &spec).await {
        Ok(workflow) => (StatusCode::CREATED, Json(workflow)).into_response(),
        Err(err) => {
            error!(?err, user = %user.name(), "Failed to submit workflow");
            ApiError::from(err).into_response()
        }
    }
}

/// Handler for listing the caller's workflows
pub async fn list_workflows_handler(
    State(server): State<Arc<DispatchServer>>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> impl IntoResponse {
    match server.dispatcher().list_workflows(&user).await {
        Ok(workflows) => (StatusCode::OK, Json(workflows)).into_response(),
        Err(err) => {
            error!(?err, user = %user.name(), "Failed to list workflows");
            ApiError::from(err).into_response()
        }
    }
}

/// Handler for getting a workflow by ID
pub async fn get_workflow_handler(
    State(server): State<Arc<DispatchServer>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(workflow_id): Path<String>,
) -> impl IntoResponse {
    let id = WorkflowId(workflow_id);
    match server.dispatcher().get_workflow(&user, &id).await {
        Ok(workflow) => (StatusCode::OK, Json(workflow)).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

/// Handler for deleting a workflow
pub async fn delete_workflow_handler(
    State(server): State<Arc<DispatchServer>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(workflow_id): Path<String>,
) -> impl IntoResponse {
    let id = WorkflowId(workflow_id);
    info!(workflow_id = %id, user = %user.name(), "Deleting workflow");

    match server.dispatcher().delete_workflow(&user, &id).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

/// Handler for fetching the per-node logs of a workflow
pub async fn workflow_logs_handler(
    State(server): State<Arc<DispatchServer>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(workflow_id): Path<String>,
) -> impl IntoResponse {
    let id = WorkflowId(workflow_id);
    match server.dispatcher().get_logs(&user, &id).await {
        Ok(bundle) => (StatusCode::OK, Json(bundle)).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
