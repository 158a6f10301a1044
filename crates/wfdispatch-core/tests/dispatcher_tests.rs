use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use wfdispatch_core::{
    BackendPhase, DeletionResult, DeletionStatus, DispatchError, InMemoryBackend, LogAggregator,
    Namespace, PrefixNamespaceResolver, UserContext, WorkflowDispatcher, WorkflowId, WorkflowSpec,
    WorkflowStatus, WorkflowStore,
};

fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("wfdispatch_core=debug".parse().unwrap()),
        )
        .with_test_writer()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn setup() -> (Arc<InMemoryBackend>, WorkflowDispatcher) {
    init_test_tracing();
    let backend = Arc::new(InMemoryBackend::new());
    let dispatcher = WorkflowDispatcher::new(
        Arc::new(PrefixNamespaceResolver::new("nublado")),
        WorkflowStore::new(backend.clone()),
        LogAggregator::new(backend.clone()),
    );
    (backend, dispatcher)
}

fn alice() -> UserContext {
    UserContext::new("alice", vec!["g_users".to_string()])
}

fn alice_ns() -> Namespace {
    Namespace("nublado-alice".to_string())
}

#[tokio::test]
async fn test_full_workflow_lifecycle() {
    let (backend, dispatcher) = setup();
    let user = alice();

    let submitted = dispatcher
        .submit_workflow(&user, &WorkflowSpec::new(json!({"steps": 3})))
        .await
        .unwrap();
    assert_eq!(submitted.id, WorkflowId::from("wf-1"));
    assert_eq!(submitted.namespace, alice_ns());
    assert_eq!(submitted.status, WorkflowStatus::Pending);
    assert!(submitted.nodes.is_empty());
    assert_eq!(
        backend.submitted_spec(&alice_ns(), "wf-1").unwrap().as_value(),
        &json!({"steps": 3})
    );

    // Not picked up by the orchestrator yet
    let pending = dispatcher.get_workflow(&user, &submitted.id).await.unwrap();
    assert_eq!(pending.status, WorkflowStatus::Pending);
    assert!(pending.nodes.is_empty());
    assert_eq!(serde_json::to_value(&pending.nodes).unwrap(), json!({}));
    assert!(dispatcher.get_logs(&user, &submitted.id).await.unwrap().is_empty());

    // The orchestrator starts three steps
    backend.set_phase(&alice_ns(), "wf-1", BackendPhase::Running);
    for step in ["wf-1-a", "wf-1-b", "wf-1-c"] {
        backend.add_node(&alice_ns(), "wf-1", step, BackendPhase::Running);
        backend.set_log(&alice_ns(), step, format!("output of {}\n", step));
    }

    let running = dispatcher.get_workflow(&user, &submitted.id).await.unwrap();
    assert_eq!(running.status, WorkflowStatus::Running);
    assert_eq!(running.nodes.len(), 3);

    let logs = dispatcher.get_logs(&user, &submitted.id).await.unwrap();
    let names: Vec<&str> = logs.entries().iter().map(|entry| entry.name.as_str()).collect();
    assert_eq!(names, vec!["wf-1-a", "wf-1-b", "wf-1-c"]);
    assert_eq!(logs.entries()[1].logs, "output of wf-1-b\n");
    assert!(!logs.is_partial());

    let deleted = dispatcher.delete_workflow(&user, &submitted.id).await.unwrap();
    assert_eq!(deleted, DeletionResult::success("wf-1"));
    assert_eq!(
        serde_json::to_value(&deleted).unwrap(),
        json!({"status": "Success", "name": "wf-1"})
    );

    let err = dispatcher.get_workflow(&user, &submitted.id).await.unwrap_err();
    assert_eq!(err, DispatchError::NotFound("wf-1".to_string()));
}

#[tokio::test]
async fn test_other_users_workflows_are_invisible() {
    let (_backend, dispatcher) = setup();
    let alice = alice();
    let bob = UserContext::new("bob", vec![]);

    let submitted = dispatcher
        .submit_workflow(&alice, &WorkflowSpec::new(json!({})))
        .await
        .unwrap();

    assert!(dispatcher.get_workflow(&bob, &submitted.id).await.unwrap_err().is_not_found());
    assert!(dispatcher.get_logs(&bob, &submitted.id).await.unwrap_err().is_not_found());
    assert!(dispatcher.delete_workflow(&bob, &submitted.id).await.unwrap_err().is_not_found());
    assert!(dispatcher.list_workflows(&bob).await.unwrap().is_empty());

    // Still there for its owner
    assert_eq!(dispatcher.list_workflows(&alice).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_reflects_submissions_in_order() {
    let (_backend, dispatcher) = setup();
    let user = alice();

    assert!(dispatcher.list_workflows(&user).await.unwrap().is_empty());
    for _ in 0..3 {
        dispatcher
            .submit_workflow(&user, &WorkflowSpec::new(json!({})))
            .await
            .unwrap();
    }

    let ids: Vec<String> = dispatcher
        .list_workflows(&user)
        .await
        .unwrap()
        .into_iter()
        .map(|workflow| workflow.id.to_string())
        .collect();
    assert_eq!(ids, vec!["wf-1", "wf-2", "wf-3"]);
}

#[tokio::test]
async fn test_second_delete_is_not_found() {
    let (_backend, dispatcher) = setup();
    let user = alice();
    let submitted = dispatcher
        .submit_workflow(&user, &WorkflowSpec::new(json!({})))
        .await
        .unwrap();

    dispatcher.delete_workflow(&user, &submitted.id).await.unwrap();
    let err = dispatcher.delete_workflow(&user, &submitted.id).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_rejected_delete_reports_failure() {
    let (backend, dispatcher) = setup();
    let user = alice();
    let submitted = dispatcher
        .submit_workflow(&user, &WorkflowSpec::new(json!({})))
        .await
        .unwrap();
    backend.reject_deletion(&alice_ns(), "wf-1", "finalizer still running");

    let result = dispatcher.delete_workflow(&user, &submitted.id).await.unwrap();
    assert_eq!(result.status, DeletionStatus::Failed);
    assert_eq!(result.message.as_deref(), Some("finalizer still running"));

    // The workflow survives a rejected deletion
    assert!(dispatcher.get_workflow(&user, &submitted.id).await.is_ok());
}

#[tokio::test]
async fn test_logs_of_pending_workflow_are_empty() {
    let (_backend, dispatcher) = setup();
    let user = alice();
    let submitted = dispatcher
        .submit_workflow(&user, &WorkflowSpec::new(json!({})))
        .await
        .unwrap();

    let logs = dispatcher.get_logs(&user, &submitted.id).await.unwrap();
    assert!(logs.is_empty());
}

#[tokio::test]
async fn test_failed_node_log_is_partial_not_error() {
    let (backend, dispatcher) = setup();
    let user = alice();
    let submitted = dispatcher
        .submit_workflow(&user, &WorkflowSpec::new(json!({})))
        .await
        .unwrap();
    backend.add_node(&alice_ns(), "wf-1", "wf-1-a", BackendPhase::Succeeded);
    backend.add_node(&alice_ns(), "wf-1", "wf-1-b", BackendPhase::Failed);
    backend.set_log(&alice_ns(), "wf-1-a", "ok\n");
    backend.fail_log(&alice_ns(), "wf-1-b", "pod evicted");

    let logs = dispatcher.get_logs(&user, &submitted.id).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.is_partial());
    let failed: Vec<&str> = logs.failed().map(|entry| entry.name.as_str()).collect();
    assert_eq!(failed, vec!["wf-1-b"]);
    assert_eq!(logs.entries()[1].logs, "");
}

#[tokio::test]
async fn test_terminal_statuses_are_mapped() {
    let (backend, dispatcher) = setup();
    let user = alice();
    let first = dispatcher
        .submit_workflow(&user, &WorkflowSpec::new(json!({})))
        .await
        .unwrap();
    let second = dispatcher
        .submit_workflow(&user, &WorkflowSpec::new(json!({})))
        .await
        .unwrap();

    backend.set_phase(&alice_ns(), "wf-1", BackendPhase::Succeeded);
    backend.set_phase(&alice_ns(), "wf-2", BackendPhase::Error);

    let first = dispatcher.get_workflow(&user, &first.id).await.unwrap();
    let second = dispatcher.get_workflow(&user, &second.id).await.unwrap();
    assert_eq!(first.status, WorkflowStatus::Succeeded);
    assert_eq!(second.status, WorkflowStatus::Failed);
    assert!(first.status.is_terminal());
}

#[tokio::test]
async fn test_resolution_failure_never_reaches_backend() {
    init_test_tracing();
    let backend = Arc::new(InMemoryBackend::new());
    let dispatcher = WorkflowDispatcher::new(
        Arc::new(PrefixNamespaceResolver::new("nublado").with_required_group("g_workflows")),
        WorkflowStore::new(backend.clone()),
        LogAggregator::new(backend.clone()),
    );

    let err = dispatcher
        .submit_workflow(&alice(), &WorkflowSpec::new(json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Configuration(_)));
    assert!(!backend.contains(&alice_ns(), "wf-1"));
}

#[tokio::test]
async fn test_health_check_follows_backend() {
    let (backend, dispatcher) = setup();
    assert!(dispatcher.health_check().await.unwrap());
    backend.set_healthy(false);
    assert!(!dispatcher.health_check().await.unwrap());
}

#[tokio::test]
async fn test_ids_that_are_not_resource_names_are_not_found() {
    let (backend, dispatcher) = setup();
    let alice = alice();
    let bob = UserContext::new("bob", vec![]);
    let bob_ns = Namespace("nublado-bob".to_string());

    let bobs = dispatcher
        .submit_workflow(&bob, &WorkflowSpec::new(json!({})))
        .await
        .unwrap();
    assert_eq!(bobs.id, WorkflowId::from("wf-1"));

    for id in ["../nublado-bob/wf-1", "..", "nublado-bob/wf-1", "WF-1", ""] {
        let id = WorkflowId::from(id);
        assert!(dispatcher.get_workflow(&alice, &id).await.unwrap_err().is_not_found());
        assert!(dispatcher.get_logs(&alice, &id).await.unwrap_err().is_not_found());
        assert!(dispatcher.delete_workflow(&alice, &id).await.unwrap_err().is_not_found());
    }

    assert!(backend.contains(&bob_ns, "wf-1"));
}
