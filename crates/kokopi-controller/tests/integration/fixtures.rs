/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Test fixture wiring the controller to an in-memory store.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use k8s_openapi::api::networking::v1::Ingress;
use kokopi_controller::api::{self, AppState};
use kokopi_controller::k8s::objects::{build_route, RouteTarget};
use kokopi_controller::orchestrator::Orchestrator;
use kokopi_controller::store::{MemoryStore, TerminationBehaviour};
use kokopi_models::models::{DeployRequest, HostConfig, PortConfig};
use kokopi_utils::config::Settings;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub struct TestFixture {
    pub store: Arc<MemoryStore>,
    pub settings: Settings,
    pub state: AppState,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new(), None)
    }

    pub fn with_termination(termination: TerminationBehaviour) -> Self {
        Self::with_store(MemoryStore::with_termination(termination), None)
    }

    pub fn with_token(token: &str) -> Self {
        Self::with_store(MemoryStore::new(), Some(token.to_string()))
    }

    fn with_store(store: MemoryStore, token: Option<String>) -> Self {
        let mut settings = Settings::new(None).expect("Failed to load default settings");
        settings.deletion.poll_interval_ms = 250;
        settings.deletion.max_attempts = 4;
        settings.auth.admin_token = token;

        let store = Arc::new(store);
        let state = AppState::new(store.clone(), &settings);
        Self {
            store,
            settings,
            state,
        }
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        self.state.orchestrator.clone()
    }

    pub fn create_test_router(&self) -> Router {
        api::configure_api_routes(self.state.clone(), &self.settings.cors)
            .with_state(self.state.clone())
    }

    /// Sends one request through the router, returning status and parsed body.
    ///
    /// Non-JSON bodies come back as a JSON string.
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", token);
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.create_test_router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    /// Places an ingress for `host` in an unrelated namespace.
    pub fn occupy_hostname(&self, namespace: &str, host: &str) {
        self.store.insert_ingress(namespace, ingress_for(host));
    }
}

pub fn ingress_for(host: &str) -> Ingress {
    build_route(
        "existing-1",
        &[RouteTarget {
            host: host.to_string(),
            path: "/".to_string(),
            port: 3000,
        }],
        "other",
        "nginx",
    )
}

pub fn simple_request(namespace: &str, host: &str) -> DeployRequest {
    DeployRequest {
        namespace: namespace.to_string(),
        repo_url: "https://github.com/acme/widget.git".to_string(),
        env_vars: Some("A=1\nB=2".to_string()),
        host: Some(host.to_string()),
        ..DeployRequest::default()
    }
}

pub fn advanced_request(namespace: &str) -> DeployRequest {
    DeployRequest {
        namespace: namespace.to_string(),
        repo_url: "https://github.com/acme/api-server".to_string(),
        ports: Some(vec![PortConfig {
            container_port: 8080,
        }]),
        hosts: Some(vec![HostConfig {
            hostname: "a.test".to_string(),
            path: None,
            target_port: Some(8080),
        }]),
        replicas: Some(2),
        ..DeployRequest::default()
    }
}
