/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use crate::fixtures::{advanced_request, simple_request, TestFixture};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kokopi_controller::error::ControllerError;
use kokopi_controller::k8s::accessors;
use kokopi_controller::k8s::objects::{
    CLONE_CONTAINER, REPOSITORY_ANNOTATION, REPOSITORY_LABEL, RESTARTED_AT_ANNOTATION,
};
use kokopi_controller::store::{ResourceStore, StoreError, TerminationBehaviour};
use kokopi_models::models::{DeleteStatus, EnvEntry};

#[tokio::test]
async fn test_hostname_conflict_creates_nothing() {
    let fixture = TestFixture::new();
    fixture.occupy_hostname("someone-else", "widget.example.test");

    let err = fixture
        .orchestrator()
        .deploy(&simple_request("acme", "widget.example.test"))
        .await
        .unwrap_err();

    match err {
        ControllerError::HostnameConflict(hosts) => {
            assert_eq!(hosts, vec!["widget.example.test".to_string()])
        }
        other => panic!("expected HostnameConflict, got {:?}", other),
    }
    assert_eq!(fixture.store.operations(), vec!["list_all_ingresses"]);
    // only the pre-existing ingress
    assert_eq!(fixture.store.object_counts(), (0, 0, 0, 1));
}

#[tokio::test]
async fn test_ports_and_hosts_are_wired_through() {
    let fixture = TestFixture::new();
    let response = fixture
        .orchestrator()
        .deploy(&advanced_request("acme"))
        .await
        .unwrap();
    assert!(response.pod_name.starts_with("api-server-"));

    let deployment = fixture
        .store
        .deployment("acme", &response.pod_name)
        .unwrap();
    assert_eq!(accessors::replicas(&deployment), 2);
    let app = accessors::main_container(&deployment, "app").unwrap();
    assert_eq!(app.ports.as_ref().unwrap()[0].container_port, 8080);

    let services = fixture.store.list_services("acme").await.unwrap();
    let port = &services[0].spec.as_ref().unwrap().ports.as_ref().unwrap()[0];
    assert_eq!(port.port, 8080);
    assert_eq!(port.target_port, Some(IntOrString::Int(8080)));

    let ingresses = fixture.store.list_ingresses("acme").await.unwrap();
    let rule = &ingresses[0].spec.as_ref().unwrap().rules.as_ref().unwrap()[0];
    assert_eq!(rule.host.as_deref(), Some("a.test"));
    let backend = rule.http.as_ref().unwrap().paths[0]
        .backend
        .service
        .as_ref()
        .unwrap();
    assert_eq!(backend.name, response.pod_name);
    assert_eq!(backend.port.as_ref().unwrap().number, Some(8080));
}

#[tokio::test]
async fn test_patch_env_replaces_whole_list() {
    let fixture = TestFixture::new();
    let orchestrator = fixture.orchestrator();
    let response = orchestrator
        .deploy(&simple_request("acme", "widget.example.test"))
        .await
        .unwrap();

    let before = orchestrator
        .deployment_detail("acme", &response.pod_name)
        .await
        .unwrap();
    assert_eq!(
        before.env_vars,
        vec![EnvEntry::new("A", "1"), EnvEntry::new("B", "2")]
    );

    orchestrator
        .patch_env("acme", &response.pod_name, "B=3")
        .await
        .unwrap();

    let after = orchestrator
        .deployment_detail("acme", &response.pod_name)
        .await
        .unwrap();
    assert_eq!(after.env_vars, vec![EnvEntry::new("B", "3")]);
    assert_eq!(after.env_text, "B=3");
}

#[tokio::test]
async fn test_restart_only_stamps_template() {
    let fixture = TestFixture::new();
    let orchestrator = fixture.orchestrator();
    let response = orchestrator
        .deploy(&simple_request("acme", "widget.example.test"))
        .await
        .unwrap();
    let before = fixture.store.deployment("acme", &response.pod_name).unwrap();

    orchestrator
        .restart("acme", &response.pod_name)
        .await
        .unwrap();
    let mut after = fixture.store.deployment("acme", &response.pod_name).unwrap();

    let stamp = accessors::template_annotations(&after)
        .get(RESTARTED_AT_ANNOTATION)
        .cloned()
        .unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok());

    // Removing the stamp and version leaves the stored object unchanged
    if let Some(meta) = after
        .spec
        .as_mut()
        .and_then(|spec| spec.template.metadata.as_mut())
    {
        meta.annotations = None;
    }
    let mut before = before;
    before.metadata.resource_version = None;
    after.metadata.resource_version = None;
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_redeploy_rewrites_clone_and_tenant() {
    let fixture = TestFixture::new();
    let orchestrator = fixture.orchestrator();
    let response = orchestrator
        .deploy(&simple_request("acme", "widget.example.test"))
        .await
        .unwrap();

    orchestrator
        .redeploy("acme", &response.pod_name, "https://github.com/acme/widget-next")
        .await
        .unwrap();

    let mut deployment = fixture.store.deployment("acme", &response.pod_name).unwrap();
    assert_eq!(accessors::replicas(&deployment), 1);
    assert_eq!(
        accessors::container_env(&deployment, "app"),
        vec![EnvEntry::new("A", "1"), EnvEntry::new("B", "2")]
    );
    assert!(accessors::template_annotations(&deployment).contains_key(RESTARTED_AT_ANNOTATION));

    let clone = accessors::clone_container_mut(&mut deployment).unwrap();
    assert_eq!(clone.name, CLONE_CONTAINER);
    let command = &clone.args.as_ref().unwrap()[0];
    assert!(command.contains("git clone 'https://github.com/acme/widget-next' '/app'"));

    let namespace = fixture.store.namespace("acme").unwrap();
    assert_eq!(
        accessors::label(&namespace.metadata, REPOSITORY_LABEL),
        Some("github.com_acme_widget-next")
    );
    assert_eq!(
        accessors::annotation(&namespace.metadata, REPOSITORY_ANNOTATION),
        Some("https://github.com/acme/widget-next")
    );

    let detail = orchestrator
        .deployment_detail("acme", &response.pod_name)
        .await
        .unwrap();
    assert_eq!(
        detail.repository_url.as_deref(),
        Some("https://github.com/acme/widget-next")
    );
}

#[tokio::test]
async fn test_redeploy_rejects_bad_url_before_reading() {
    let fixture = TestFixture::new();
    let err = fixture
        .orchestrator()
        .redeploy("acme", "widget-1", "")
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::InvalidInput { field: "repoUrl", .. }));
    assert!(fixture.store.calls().is_empty());
}

#[tokio::test]
async fn test_stale_write_surfaces_as_conflict() {
    let fixture = TestFixture::new();
    let orchestrator = fixture.orchestrator();
    let response = orchestrator
        .deploy(&simple_request("acme", "widget.example.test"))
        .await
        .unwrap();

    fixture.store.fail_on(
        "replace_deployment",
        StoreError::Conflict("the object has been modified".into()),
    );
    let err = orchestrator
        .patch_env("acme", &response.pod_name, "X=1")
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::Conflict(_)));
}

#[tokio::test]
async fn test_detail_without_repository_metadata() {
    let fixture = TestFixture::new();
    let orchestrator = fixture.orchestrator();
    let response = orchestrator
        .deploy(&simple_request("acme", "widget.example.test"))
        .await
        .unwrap();

    let mut namespace = fixture.store.namespace("acme").unwrap();
    namespace.metadata.annotations = None;
    if let Some(labels) = namespace.metadata.labels.as_mut() {
        labels.remove(REPOSITORY_LABEL);
    }
    fixture.store.replace_namespace(&namespace).await.unwrap();

    let detail = orchestrator
        .deployment_detail("acme", &response.pod_name)
        .await
        .unwrap();
    assert!(detail.repository_url.is_none());
}

#[tokio::test]
async fn test_delete_missing_tenant_issues_no_delete() {
    let fixture = TestFixture::new();
    let err = fixture
        .orchestrator()
        .delete_tenant("ghost")
        .await
        .unwrap_err();

    assert!(matches!(err, ControllerError::TenantNotFound(ref t) if t == "ghost"));
    assert_eq!(fixture.store.call_count("delete_namespace"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_delete_observes_disappearance_on_second_poll() {
    let fixture = TestFixture::with_termination(TerminationBehaviour::TerminatingFor(1));
    let orchestrator = fixture.orchestrator();
    orchestrator
        .deploy(&simple_request("acme", "widget.example.test"))
        .await
        .unwrap();

    let outcome = orchestrator.delete_tenant("acme").await.unwrap();
    assert_eq!(outcome.status, DeleteStatus::Deleted);
    assert_eq!(outcome.polls, 2);
    // cascade removed everything in the tenant
    assert_eq!(fixture.store.object_counts(), (0, 0, 0, 0));
}

#[tokio::test(start_paused = true)]
async fn test_delete_exhaustion_reports_terminating() {
    let fixture = TestFixture::with_termination(TerminationBehaviour::Stuck);
    let orchestrator = fixture.orchestrator();
    orchestrator
        .deploy(&simple_request("acme", "widget.example.test"))
        .await
        .unwrap();

    let outcome = orchestrator.delete_tenant("acme").await.unwrap();
    assert_eq!(outcome.status, DeleteStatus::Terminating);
    assert_eq!(outcome.polls, fixture.settings.deletion.max_attempts);
}

#[tokio::test(start_paused = true)]
async fn test_delete_exhaustion_without_phase_reports_pending() {
    let fixture = TestFixture::with_termination(TerminationBehaviour::Silent);
    let orchestrator = fixture.orchestrator();
    orchestrator
        .deploy(&simple_request("acme", "widget.example.test"))
        .await
        .unwrap();

    let outcome = orchestrator.delete_tenant("acme").await.unwrap();
    assert_eq!(outcome.status, DeleteStatus::Pending);
    assert_eq!(outcome.polls, 4);
}

#[tokio::test]
async fn test_delete_read_failure_propagates() {
    let fixture = TestFixture::new();
    let orchestrator = fixture.orchestrator();
    orchestrator
        .deploy(&simple_request("acme", "widget.example.test"))
        .await
        .unwrap();

    fixture
        .store
        .fail_on("get_namespace", StoreError::Api("connection reset".into()));
    let err = orchestrator.delete_tenant("acme").await.unwrap_err();
    assert!(matches!(err, ControllerError::Store(_)));
    assert_eq!(fixture.store.call_count("delete_namespace"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_delete_rides_out_failed_status_read() {
    let fixture = TestFixture::with_termination(TerminationBehaviour::TerminatingFor(1));
    let orchestrator = fixture.orchestrator();
    orchestrator
        .deploy(&simple_request("acme", "widget.example.test"))
        .await
        .unwrap();

    // call 1 is the lookup before deleting, call 2 the first status poll
    fixture
        .store
        .fail_call("get_namespace", 2, StoreError::Api("connection reset".into()));
    let outcome = orchestrator.delete_tenant("acme").await.unwrap();
    assert_eq!(outcome.status, DeleteStatus::Deleted);
    assert_eq!(outcome.polls, 3);
    assert_eq!(fixture.store.call_count("delete_namespace"), 1);
    assert_eq!(fixture.store.namespace_count(), 0);
}
