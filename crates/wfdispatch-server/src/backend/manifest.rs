//! Workflow manifest decoration
//!
//! Argo CD manages the user namespaces, so every submitted workflow is
//! labelled as belonging to the user application and annotated so that Argo CD
//! neither prunes it nor counts it against the sync state.

use serde_json::{Map, Value};

use wfdispatch_core::{DispatchError, DispatchResult, Namespace, WorkflowSpec};

/// Label marking resources of the user application
pub const INSTANCE_LABEL: &str = "argocd.argoproj.io/instance";

/// Value of [`INSTANCE_LABEL`]
pub const INSTANCE_NAME: &str = "nublado-users";

/// Prefix of the per-command annotations
pub const COMMAND_ANNOTATION_PREFIX: &str = "lsst.org/wf_cmd";

/// Annotation values are kept below this length
const ANNOTATION_CHUNK: usize = 63;

/// Build the manifest sent to Argo from a submitted spec
pub fn decorate(spec: &WorkflowSpec, namespace: &Namespace) -> DispatchResult<Value> {
    spec.check_shape().map_err(DispatchError::Configuration)?;
    let mut manifest = match spec.as_value() {
        Value::Object(map) => map.clone(),
        _ => {
            return Err(DispatchError::Configuration(
                "workflow spec must be a JSON object".to_string(),
            ))
        }
    };

    let commands = command_list(&manifest);

    let metadata = manifest
        .entry("metadata")
        .or_insert_with(|| Value::Object(Map::new()));
    let metadata = metadata.as_object_mut().ok_or_else(|| {
        DispatchError::Configuration("workflow metadata must be a JSON object".to_string())
    })?;

    // Argo picks the final name when only generateName is set
    if !metadata.contains_key("name") && !metadata.contains_key("generateName") {
        metadata.insert(
            "generateName".to_string(),
            Value::String(format!("wf-{}-", namespace)),
        );
    }
    // A namespace in the manifest must not override the user's
    metadata.insert("namespace".to_string(), Value::String(namespace.to_string()));

    let labels = object_entry(metadata, "labels")?;
    labels.insert(INSTANCE_LABEL.to_string(), Value::String(INSTANCE_NAME.to_string()));

    let annotations = object_entry(metadata, "annotations")?;
    annotations.insert(
        "argocd.argoproj.io/compare-options".to_string(),
        Value::String("IgnoreExtraneous".to_string()),
    );
    annotations.insert(
        "argocd.argoproj.io/sync-options".to_string(),
        Value::String("Prune=false".to_string()),
    );
    for (key, value) in command_annotations(&commands) {
        annotations.insert(key, Value::String(value));
    }

    Ok(Value::Object(manifest))
}

/// Annotations recording the command lines of a workflow.
///
/// Command `i` goes to `lsst.org/wf_cmd_{i}`. Commands of 64 characters or
/// more are split into 63-character pieces under `lsst.org/wf_cmd_{i}_{j}`.
pub fn command_annotations(commands: &[String]) -> Vec<(String, String)> {
    let mut annotations = Vec::new();
    for (idx, command) in commands.iter().enumerate() {
        let key = format!("{}_{}", COMMAND_ANNOTATION_PREFIX, idx);
        let chars: Vec<char> = command.chars().collect();
        if chars.len() <= ANNOTATION_CHUNK {
            annotations.push((key, command.clone()));
            continue;
        }
        for (jdx, chunk) in chars.chunks(ANNOTATION_CHUNK).enumerate() {
            annotations.push((format!("{}_{}", key, jdx), chunk.iter().collect()));
        }
    }
    annotations
}

fn command_list(manifest: &Map<String, Value>) -> Vec<String> {
    match manifest.get("command") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(single)) => vec![single.clone()],
        _ => Vec::new(),
    }
}

fn object_entry<'a>(
    parent: &'a mut Map<String, Value>,
    key: &str,
) -> DispatchResult<&'a mut Map<String, Value>> {
    parent
        .entry(key)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| DispatchError::Configuration(format!("workflow metadata.{} must be a JSON object", key)))
}
