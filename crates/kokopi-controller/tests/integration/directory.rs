/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use crate::fixtures::{advanced_request, simple_request, TestFixture};
use k8s_openapi::api::core::v1::{Namespace, Pod, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kokopi_controller::directory::TenantDirectory;
use kokopi_controller::error::ControllerError;
use std::collections::BTreeMap;

fn pod(name: &str, app: &str, phase: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([("app".to_string(), app.to_string())])),
            ..ObjectMeta::default()
        },
        status: Some(PodStatus {
            phase: Some(phase.to_string()),
            ..PodStatus::default()
        }),
        ..Pod::default()
    }
}

fn directory(fixture: &TestFixture) -> TenantDirectory {
    TenantDirectory::new(fixture.store.clone())
}

#[tokio::test]
async fn test_list_tenants_only_returns_managed_namespaces() {
    let fixture = TestFixture::new();
    fixture
        .orchestrator()
        .deploy(&simple_request("acme", "widget.example.test"))
        .await
        .unwrap();
    fixture.store.insert_namespace(Namespace {
        metadata: ObjectMeta {
            name: Some("kube-system".to_string()),
            ..ObjectMeta::default()
        },
        ..Namespace::default()
    });

    let tenants = directory(&fixture).list_tenants().await.unwrap();
    assert_eq!(tenants.len(), 1);
    let tenant = &tenants[0];
    assert_eq!(tenant.name, "acme");
    assert_eq!(tenant.phase.as_deref(), Some("Active"));
    assert_eq!(
        tenant.repository_url.as_deref(),
        Some("https://github.com/acme/widget.git")
    );
    assert_eq!(tenant.deploy_user.as_deref(), Some("admin"));
    assert!(tenant.deployed_at.is_some());
}

#[tokio::test]
async fn test_overview_groups_objects_per_workload() {
    let fixture = TestFixture::new();
    let response = fixture
        .orchestrator()
        .deploy(&advanced_request("acme"))
        .await
        .unwrap();
    fixture
        .store
        .insert_pod("acme", pod(&format!("{}-abc12", response.pod_name), &response.pod_name, "Running"));
    fixture
        .store
        .insert_pod("acme", pod("debug-shell", "debug", "Pending"));

    let overview = directory(&fixture).tenant_overview("acme").await.unwrap();
    assert_eq!(overview.namespace, "acme");
    assert!(overview.unavailable.is_empty());

    assert_eq!(overview.workloads.len(), 1);
    let workload = &overview.workloads[0];
    assert_eq!(workload.name, response.pod_name);
    assert_eq!(workload.replicas, 2);
    assert_eq!(workload.ready_replicas, 0);
    assert_eq!(workload.service_ports, vec![8080]);
    assert_eq!(workload.hosts, vec!["a.test".to_string()]);
    assert_eq!(workload.pods.len(), 1);
    assert_eq!(workload.pods[0].phase.as_deref(), Some("Running"));

    assert_eq!(overview.unmatched_pods.len(), 1);
    assert_eq!(overview.unmatched_pods[0].name, "debug-shell");
}

#[tokio::test]
async fn test_overview_of_missing_tenant() {
    let fixture = TestFixture::new();
    let err = directory(&fixture)
        .tenant_overview("ghost")
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::TenantNotFound(ref t) if t == "ghost"));
    assert_eq!(fixture.store.call_count("list_pods"), 0);
}

#[tokio::test]
async fn test_pod_logs_of_unknown_pod() {
    let fixture = TestFixture::new();
    fixture
        .orchestrator()
        .deploy(&simple_request("acme", "widget.example.test"))
        .await
        .unwrap();

    let err = directory(&fixture)
        .pod_logs("acme", "nope", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ControllerError::ResourceNotFound { kind: "Pod", .. }
    ));
}
