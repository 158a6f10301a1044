//! Argo Workflows implementation of the OrchestrationBackend
//!
//! Workflows are managed through the Argo Server REST API; pod logs are read
//! through the Kubernetes API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use wfdispatch_core::{
    BackendDeletion, BackendLookup, BackendNode, BackendPhase, BackendWorkflow, DispatchError,
    DispatchResult, Namespace, OrchestrationBackend, WorkflowId, WorkflowSpec,
};

use super::manifest;
use crate::error::{ServerError, ServerResult};

/// Argo Server client
#[derive(Debug, Clone)]
pub struct ArgoBackend {
    /// Argo Server base URL
    api_base_url: Url,

    /// Kubernetes API base URL, for pod logs
    kube_api_url: Url,

    /// Bearer token sent to both APIs
    api_token: Option<String>,

    /// HTTP client
    client: Client,
}

impl ArgoBackend {
    /// Create a new ArgoBackend
    pub fn new(
        api_base_url: impl Into<String>,
        kube_api_url: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
    ) -> ServerResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            api_base_url: parse_base(api_base_url.into())?,
            kube_api_url: parse_base(kube_api_url.into())?,
            api_token,
            client,
        })
    }

    /// Get the URL of the workflows of a namespace
    fn workflows_url(&self, namespace: &Namespace) -> DispatchResult<Url> {
        endpoint(&self.api_base_url, &["api", "v1", "workflows", namespace.as_str()])
    }

    /// Get the URL of a specific workflow
    fn workflow_url(&self, namespace: &Namespace, id: &WorkflowId) -> DispatchResult<Url> {
        endpoint(
            &self.api_base_url,
            &["api", "v1", "workflows", namespace.as_str(), id.as_str()],
        )
    }

    /// Get the URL of a pod's log
    fn pod_log_url(&self, namespace: &Namespace, pod_name: &str) -> DispatchResult<Url> {
        endpoint(
            &self.kube_api_url,
            &["api", "v1", "namespaces", namespace.as_str(), "pods", pod_name, "log"],
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> DispatchResult<Response> {
        self.authorized(request).send().await.map_err(transport_error)
    }
}

fn parse_base(raw: String) -> ServerResult<Url> {
    let url = Url::parse(&raw)
        .map_err(|e| ServerError::ConfigError(format!("Invalid backend URL {}: {}", raw, e)))?;
    if url.cannot_be_a_base() {
        return Err(ServerError::ConfigError(format!("Backend URL {} cannot be a base", raw)));
    }
    Ok(url)
}

/// Append path segments to a base URL.
///
/// Each segment is percent-encoded on its own, so `/` or `..` inside a
/// segment never changes the resource the request addresses.
fn endpoint(base: &Url, segments: &[&str]) -> DispatchResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| DispatchError::Configuration(format!("Backend URL {} cannot be a base", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn transport_error(err: reqwest::Error) -> DispatchError {
    if err.is_timeout() {
        DispatchError::BackendUnavailable(format!("backend request timed out: {}", err))
    } else {
        DispatchError::BackendUnavailable(format!("backend request failed: {}", err))
    }
}

/// Pull the human-readable message out of an Argo or Kubernetes error body
async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| value["message"].as_str().map(str::to_string))
        .unwrap_or(body);

    if message.is_empty() {
        status.to_string()
    } else {
        message
    }
}

/// Map a non-success response that has no operation-specific meaning
async fn unexpected_status(operation: &str, response: Response) -> DispatchError {
    let status = response.status();
    let message = error_message(response).await;
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DispatchError::Configuration(format!(
            "backend refused {} ({}): {}",
            operation, status, message
        )),
        _ => DispatchError::BackendUnavailable(format!(
            "backend {} failed ({}): {}",
            operation, status, message
        )),
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Convert an Argo workflow resource
pub fn parse_workflow(resource: &Value) -> DispatchResult<BackendWorkflow> {
    let metadata = &resource["metadata"];
    let name = metadata["name"].as_str().ok_or_else(|| {
        DispatchError::BackendUnavailable("Malformed backend payload: workflow without a name".to_string())
    })?;
    let namespace = metadata["namespace"].as_str().unwrap_or_default();

    let status = &resource["status"];
    let nodes = match status["nodes"].as_object() {
        Some(nodes) => nodes
            .iter()
            .map(|(node_id, node)| BackendNode {
                id: node_id.clone(),
                pod_name: node["podName"].as_str().unwrap_or(node_id.as_str()).to_string(),
                phase: BackendPhase::parse(node["phase"].as_str()),
            })
            .collect(),
        None => Vec::new(),
    };

    Ok(BackendWorkflow {
        name: name.to_string(),
        namespace: namespace.to_string(),
        phase: BackendPhase::parse(status["phase"].as_str()),
        nodes,
        created_at: parse_timestamp(&metadata["creationTimestamp"]),
        deleted_at: parse_timestamp(&metadata["deletionTimestamp"]),
    })
}

#[async_trait]
impl OrchestrationBackend for ArgoBackend {
    async fn submit(&self, namespace: &Namespace, spec: &WorkflowSpec) -> DispatchResult<BackendWorkflow> {
        let workflow = manifest::decorate(spec, namespace)?;
        info!(%namespace, "Creating Argo workflow");

        let response = self
            .send(
                self.client
                    .post(self.workflows_url(namespace)?)
                    .json(&json!({ "namespace": namespace.as_str(), "workflow": workflow })),
            )
            .await?;

        if !response.status().is_success() {
            return Err(unexpected_status("submission", response).await);
        }

        let created: Value = response.json().await.map_err(transport_error)?;
        parse_workflow(&created)
    }

    async fn get(&self, namespace: &Namespace, id: &WorkflowId) -> DispatchResult<BackendLookup> {
        debug!(%namespace, workflow_id = %id, "Fetching Argo workflow");
        let response = self.send(self.client.get(self.workflow_url(namespace, id)?)).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(BackendLookup::Missing),
            status if status.is_success() => {
                let resource: Value = response.json().await.map_err(transport_error)?;
                Ok(BackendLookup::Found(parse_workflow(&resource)?))
            }
            _ => Err(unexpected_status("lookup", response).await),
        }
    }

    async fn list(&self, namespace: &Namespace) -> DispatchResult<Vec<BackendWorkflow>> {
        debug!(%namespace, "Listing Argo workflows");
        let response = self.send(self.client.get(self.workflows_url(namespace)?)).await?;

        // Argo answers 404 for a namespace that was never provisioned
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(unexpected_status("listing", response).await);
        }

        let body: Value = response.json().await.map_err(transport_error)?;
        match body["items"].as_array() {
            Some(items) => items.iter().map(parse_workflow).collect(),
            None => Ok(Vec::new()),
        }
    }

    async fn delete(&self, namespace: &Namespace, id: &WorkflowId) -> DispatchResult<BackendDeletion> {
        info!(%namespace, workflow_id = %id, "Deleting Argo workflow");
        let response = self.send(self.client.delete(self.workflow_url(namespace, id)?)).await?;

        let status = response.status();
        if status.is_success() {
            return Ok(BackendDeletion::Deleted);
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(BackendDeletion::Missing);
        }
        if status.is_server_error() {
            return Err(unexpected_status("deletion", response).await);
        }

        let message = error_message(response).await;
        warn!(%namespace, workflow_id = %id, %status, %message, "Argo refused deletion");
        Ok(BackendDeletion::Rejected(message))
    }

    async fn read_log(&self, namespace: &Namespace, pod_name: &str, container: &str) -> DispatchResult<String> {
        debug!(%namespace, %pod_name, %container, "Reading pod log");
        let response = self
            .send(
                self.client
                    .get(self.pod_log_url(namespace, pod_name)?)
                    .query(&[("container", container)]),
            )
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(DispatchError::NotFound(format!("pod {}", pod_name))),
            status if status.is_success() => response.text().await.map_err(transport_error),
            _ => Err(unexpected_status("log read", response).await),
        }
    }

    async fn health_check(&self) -> DispatchResult<bool> {
        debug!("Performing health check");
        let url = endpoint(&self.api_base_url, &["api", "v1", "version"])?;
        let response = self.send(self.client.get(url)).await?;
        Ok(response.status().is_success())
    }
}
