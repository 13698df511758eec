/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use crate::fixtures::TestFixture;
use axum::http::StatusCode;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kokopi_controller::store::StoreError;
use serde_json::{json, Value};

fn deploy_body(namespace: &str, host: &str) -> Value {
    json!({
        "namespace": namespace,
        "repoUrl": "https://github.com/acme/widget.git",
        "envVars": "A=1\nB=2",
        "host": host,
    })
}

/// Deploys through the API and returns the generated workload name.
async fn deploy(fixture: &TestFixture, namespace: &str, host: &str) -> String {
    let (status, body) = fixture
        .send("POST", "/api/deploy", Some(deploy_body(namespace, host)), None)
        .await;
    assert_eq!(status, StatusCode::OK, "deploy failed: {}", body);
    body["podName"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_probes() {
    let fixture = TestFixture::new();

    let (status, body) = fixture.send("GET", "/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("OK"));

    let (status, body) = fixture.send("GET", "/readyz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Ready"));

    fixture
        .store
        .fail_on("ping", StoreError::Api("unreachable".into()));
    let (status, _) = fixture.send("GET", "/readyz", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new();
    fixture.send("GET", "/api/namespaces", None, None).await;

    let (status, body) = fixture.send("GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_str().unwrap().contains("kokopi_http_requests_total"));
}

#[tokio::test]
async fn test_deploy_and_list() {
    let fixture = TestFixture::new();
    let (status, body) = fixture
        .send(
            "POST",
            "/api/deploy",
            Some(deploy_body("acme", "widget.example.test")),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let pod_name = body["podName"].as_str().unwrap();
    assert!(pod_name.starts_with("widget-"));
    assert_eq!(body["namespace"], "acme");
    assert_eq!(
        body["message"],
        format!("Deployment {} created successfully", pod_name)
    );

    let (status, body) = fixture.send("GET", "/api/namespaces", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["name"], "acme");
    assert_eq!(body[0]["repositoryUrl"], "https://github.com/acme/widget.git");

    let (status, body) = fixture
        .send("GET", "/api/namespace/acme/deployments", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["metadata"]["name"], pod_name);

    let (status, body) = fixture
        .send("GET", "/api/namespace/acme/ingresses", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["spec"]["rules"][0]["host"], "widget.example.test");
}

#[tokio::test]
async fn test_deploy_rejects_malformed_body() {
    let fixture = TestFixture::new();
    let (status, body) = fixture
        .send("POST", "/api/deploy", Some(json!({ "namespace": "acme" })), None)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("invalid body"));
    assert!(fixture.store.calls().is_empty());
}

#[tokio::test]
async fn test_deploy_rejects_invalid_namespace() {
    let fixture = TestFixture::new();
    let (status, body) = fixture
        .send(
            "POST",
            "/api/deploy",
            Some(deploy_body("Not_A_Label", "widget.example.test")),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("namespace"));
}

#[tokio::test]
async fn test_deploy_hostname_conflict() {
    let fixture = TestFixture::new();
    fixture.occupy_hostname("other", "widget.example.test");

    let (status, body) = fixture
        .send(
            "POST",
            "/api/deploy",
            Some(deploy_body("acme", "widget.example.test")),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["error"],
        "hostname already in use: widget.example.test"
    );
    assert_eq!(fixture.store.namespace_count(), 0);
}

#[tokio::test]
async fn test_missing_namespace_is_not_found() {
    let fixture = TestFixture::new();

    let (status, body) = fixture.send("GET", "/api/namespace/ghost", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "namespace ghost not found");

    let (status, _) = fixture
        .send("DELETE", "/api/namespace/ghost", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_namespace_overview() {
    let fixture = TestFixture::new();
    let pod_name = deploy(&fixture, "acme", "widget.example.test").await;

    let (status, body) = fixture.send("GET", "/api/namespace/acme", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["namespace"], "acme");
    assert_eq!(body["workloads"][0]["name"], pod_name.as_str());
    assert_eq!(body["workloads"][0]["servicePorts"], json!([3000]));
    assert_eq!(body["workloads"][0]["hosts"], json!(["widget.example.test"]));
}

#[tokio::test(start_paused = true)]
async fn test_delete_routes() {
    let fixture = TestFixture::new();
    deploy(&fixture, "acme", "widget.example.test").await;
    deploy(&fixture, "beta", "beta.example.test").await;

    let (status, body) = fixture
        .send("DELETE", "/api/namespace/acme", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "deleted");
    assert_eq!(body["polls"], 2);
    assert_eq!(body["message"], "Namespace acme deleted successfully");

    let (status, body) = fixture
        .send("POST", "/api/namespace/beta/delete", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["namespace"], "beta");
    assert_eq!(body["status"], "deleted");

    assert_eq!(fixture.store.namespace_count(), 0);
}

#[tokio::test]
async fn test_pod_routes() {
    let fixture = TestFixture::new();
    let pod_name = deploy(&fixture, "acme", "widget.example.test").await;
    let pod = format!("{}-7d9f8", pod_name);
    fixture.store.insert_pod(
        "acme",
        Pod {
            metadata: ObjectMeta {
                name: Some(pod.clone()),
                ..ObjectMeta::default()
            },
            ..Pod::default()
        },
    );
    fixture.store.set_logs("acme", &pod, "listening on 3000\n");

    let (status, body) = fixture
        .send("GET", "/api/namespace/acme/pods", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["metadata"]["name"], pod.as_str());

    let (status, body) = fixture
        .send(
            "GET",
            &format!("/api/namespace/acme/pod/{}/log?container=app", pod),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "log": "listening on 3000\n" }));

    let (status, body) = fixture
        .send("GET", "/api/namespace/acme/pod/missing", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Pod missing not found");
}

#[tokio::test]
async fn test_deployment_lifecycle() {
    let fixture = TestFixture::new();
    let pod_name = deploy(&fixture, "acme", "widget.example.test").await;
    let base = format!("/api/namespace/acme/deployment/{}", pod_name);

    let (status, body) = fixture.send("GET", &base, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["envText"], "A=1\nB=2");
    assert_eq!(body["repositoryUrl"], "https://github.com/acme/widget.git");

    let (status, body) = fixture
        .send(
            "PATCH",
            &format!("{}/env", base),
            Some(json!({ "envVars": "B=3" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["envVars"], json!([{ "name": "B", "value": "3" }]));
    assert_eq!(body["envText"], "B=3");

    let (status, body) = fixture
        .send("POST", &format!("{}/restart", base), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["restartedAt"].as_str().unwrap().is_empty());

    let (status, body) = fixture
        .send(
            "POST",
            &format!("{}/redeploy", base),
            Some(json!({ "repoUrl": "https://github.com/acme/widget-next" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["message"],
        format!(
            "Deployment {} redeployed from https://github.com/acme/widget-next",
            pod_name
        )
    );

    let (_, body) = fixture.send("GET", &base, None, None).await;
    assert_eq!(body["repositoryUrl"], "https://github.com/acme/widget-next");
    assert_eq!(body["envText"], "B=3");
}

#[tokio::test]
async fn test_unknown_deployment_in_existing_namespace() {
    let fixture = TestFixture::new();
    deploy(&fixture, "acme", "widget.example.test").await;

    let (status, body) = fixture
        .send(
            "POST",
            "/api/namespace/acme/deployment/nope/restart",
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Deployment nope not found");
}

#[tokio::test]
async fn test_stale_write_is_conflict() {
    let fixture = TestFixture::new();
    let pod_name = deploy(&fixture, "acme", "widget.example.test").await;
    fixture.store.fail_on(
        "replace_deployment",
        StoreError::Conflict("Deployment has been modified".into()),
    );

    let (status, body) = fixture
        .send(
            "PATCH",
            &format!("/api/namespace/acme/deployment/{}/env", pod_name),
            Some(json!({ "envVars": "X=1" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().starts_with("conflict"));
}

#[tokio::test]
async fn test_admin_token_guards_api() {
    let fixture = TestFixture::with_token("s3cret");

    let (status, body) = fixture.send("GET", "/api/namespaces", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authorization header required");

    let (status, body) = fixture
        .send("GET", "/api/namespaces", None, Some("wrong"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");

    let (status, _) = fixture
        .send("GET", "/api/namespaces", None, Some("s3cret"))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = fixture
        .send("GET", "/api/namespaces", None, Some("Bearer s3cret"))
        .await;
    assert_eq!(status, StatusCode::OK);

    // probes stay open
    let (status, _) = fixture.send("GET", "/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);
}
