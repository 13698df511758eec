/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! [`ResourceStore`] backed by the Kubernetes API server.

use super::{ResourceStore, StoreError, StoreResult};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Pod, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kokopi_utils::logging::prelude::*;
use kube::api::{DeleteParams, ListParams, LogParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, Error as KubeError};

/// Builds a client from an explicit kubeconfig, or from the in-cluster /
/// `KUBECONFIG` environment when no path is given.
pub async fn create_k8s_client(
    kubeconfig_path: Option<&str>,
) -> Result<Client, Box<dyn std::error::Error>> {
    let client = match kubeconfig_path {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .map_err(|e| format!("Failed to read kubeconfig {}: {}", path, e))?;
            let config =
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| format!("Failed to load kubeconfig {}: {}", path, e))?;
            Client::try_from(config)
                .map_err(|e| format!("Failed to create Kubernetes client: {}", e))?
        }
        None => Client::try_default()
            .await
            .map_err(|e| format!("Failed to create Kubernetes client: {}", e))?,
    };

    Ok(client)
}

/// Maps a kube error onto the store's vocabulary.
fn map_error(kind: &'static str, name: &str, err: KubeError) -> StoreError {
    match err {
        KubeError::Api(response) if response.code == 404 => StoreError::not_found(kind, name),
        KubeError::Api(response) if response.code == 409 => {
            StoreError::Conflict(response.message)
        }
        KubeError::Api(response) => {
            StoreError::Api(format!("{} ({}): {}", response.reason, response.code, response.message))
        }
        other => StoreError::Api(other.to_string()),
    }
}

/// Thin wrapper over `kube::Api` for the four composed kinds and pods.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaces(&self) -> Api<Namespace> {
        Api::all(self.client.clone())
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn services(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn ingresses(&self, namespace: &str) -> Api<Ingress> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn object_name(meta: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) -> &str {
    meta.name.as_deref().unwrap_or_default()
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn ping(&self) -> StoreResult<()> {
        self.client
            .apiserver_version()
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Api(e.to_string()))
    }

    async fn create_namespace(&self, namespace: &Namespace) -> StoreResult<Namespace> {
        let name = object_name(&namespace.metadata);
        debug!("Creating namespace {}", name);
        self.namespaces()
            .create(&PostParams::default(), namespace)
            .await
            .map_err(|e| map_error("Namespace", name, e))
    }

    async fn get_namespace(&self, name: &str) -> StoreResult<Namespace> {
        self.namespaces()
            .get(name)
            .await
            .map_err(|e| map_error("Namespace", name, e))
    }

    async fn list_namespaces(&self, label_selector: &str) -> StoreResult<Vec<Namespace>> {
        let params = ListParams::default().labels(label_selector);
        self.namespaces()
            .list(&params)
            .await
            .map(|list| list.items)
            .map_err(|e| map_error("Namespace", label_selector, e))
    }

    async fn replace_namespace(&self, namespace: &Namespace) -> StoreResult<Namespace> {
        let name = object_name(&namespace.metadata);
        self.namespaces()
            .replace(name, &PostParams::default(), namespace)
            .await
            .map_err(|e| map_error("Namespace", name, e))
    }

    async fn delete_namespace(&self, name: &str) -> StoreResult<()> {
        debug!("Deleting namespace {}", name);
        self.namespaces()
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| map_error("Namespace", name, e))
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> StoreResult<Deployment> {
        let name = object_name(&deployment.metadata);
        debug!("Creating deployment {}/{}", namespace, name);
        self.deployments(namespace)
            .create(&PostParams::default(), deployment)
            .await
            .map_err(|e| map_error("Deployment", name, e))
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> StoreResult<Deployment> {
        self.deployments(namespace)
            .get(name)
            .await
            .map_err(|e| map_error("Deployment", name, e))
    }

    async fn list_deployments(&self, namespace: &str) -> StoreResult<Vec<Deployment>> {
        self.deployments(namespace)
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
            .map_err(|e| map_error("Namespace", namespace, e))
    }

    async fn replace_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> StoreResult<Deployment> {
        let name = object_name(&deployment.metadata);
        self.deployments(namespace)
            .replace(name, &PostParams::default(), deployment)
            .await
            .map_err(|e| map_error("Deployment", name, e))
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> StoreResult<Service> {
        let name = object_name(&service.metadata);
        debug!("Creating service {}/{}", namespace, name);
        self.services(namespace)
            .create(&PostParams::default(), service)
            .await
            .map_err(|e| map_error("Service", name, e))
    }

    async fn list_services(&self, namespace: &str) -> StoreResult<Vec<Service>> {
        self.services(namespace)
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
            .map_err(|e| map_error("Namespace", namespace, e))
    }

    async fn create_ingress(&self, namespace: &str, ingress: &Ingress) -> StoreResult<Ingress> {
        let name = object_name(&ingress.metadata);
        debug!("Creating ingress {}/{}", namespace, name);
        self.ingresses(namespace)
            .create(&PostParams::default(), ingress)
            .await
            .map_err(|e| map_error("Ingress", name, e))
    }

    async fn list_ingresses(&self, namespace: &str) -> StoreResult<Vec<Ingress>> {
        self.ingresses(namespace)
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
            .map_err(|e| map_error("Namespace", namespace, e))
    }

    async fn list_all_ingresses(&self) -> StoreResult<Vec<Ingress>> {
        Api::<Ingress>::all(self.client.clone())
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
            .map_err(|e| StoreError::Api(e.to_string()))
    }

    async fn list_pods(&self, namespace: &str) -> StoreResult<Vec<Pod>> {
        self.pods(namespace)
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
            .map_err(|e| map_error("Namespace", namespace, e))
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> StoreResult<Pod> {
        self.pods(namespace)
            .get(name)
            .await
            .map_err(|e| map_error("Pod", name, e))
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        name: &str,
        container: Option<&str>,
    ) -> StoreResult<String> {
        let params = LogParams {
            container: container.map(str::to_string),
            ..LogParams::default()
        };
        self.pods(namespace)
            .logs(name, &params)
            .await
            .map_err(|e| map_error("Pod", name, e))
    }
}
