/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Tenant Directory
//!
//! Read side of the controller: which tenants exist, and what is running in
//! each of them. Every call reads the store fresh.
//!
//! The overview correlates a tenant's objects by the `app` label the builders
//! put on the deployment, its pods, service and ingress.

use crate::error::{ControllerError, ControllerResult};
use crate::k8s::accessors;
use crate::k8s::objects::MANAGED_SELECTOR;
use crate::metrics;
use crate::store::{ResourceStore, StoreResult};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kokopi_models::models::{PodSummary, TenantOverview, TenantSummary, WorkloadSummary};
use kokopi_utils::logging::prelude::*;
use std::sync::Arc;

fn pod_summary(pod: &Pod) -> PodSummary {
    PodSummary {
        name: accessors::name(&pod.metadata),
        phase: accessors::pod_phase(pod),
        ready: accessors::pod_ready(pod),
        restarts: accessors::pod_restarts(pod),
    }
}

/// Unwraps one overview query, recording it as unavailable on failure.
fn tolerate<T>(
    query: &str,
    tenant_id: &str,
    result: StoreResult<Vec<T>>,
    unavailable: &mut Vec<String>,
) -> Vec<T> {
    result.unwrap_or_else(|e| {
        warn!("Listing {} in {} failed: {}", query, tenant_id, e);
        unavailable.push(query.to_string());
        Vec::new()
    })
}

#[derive(Clone)]
pub struct TenantDirectory {
    store: Arc<dyn ResourceStore>,
}

impl TenantDirectory {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    /// Namespaces carrying the managed marker, summarised.
    pub async fn list_tenants(&self) -> ControllerResult<Vec<TenantSummary>> {
        let namespaces = self.store.list_namespaces(MANAGED_SELECTOR).await?;
        metrics::MANAGED_TENANTS.set(namespaces.len() as i64);

        Ok(namespaces
            .iter()
            .map(|namespace| TenantSummary {
                name: accessors::name(&namespace.metadata),
                phase: accessors::namespace_phase(namespace).map(str::to_string),
                repository_url: accessors::tenant_repository(namespace),
                deploy_user: accessors::tenant_deploy_user(namespace),
                deployed_at: accessors::tenant_deployed_at(namespace),
            })
            .collect())
    }

    pub async fn list_pods(&self, tenant_id: &str) -> ControllerResult<Vec<Pod>> {
        Ok(self.store.list_pods(tenant_id).await?)
    }

    pub async fn get_pod(&self, tenant_id: &str, name: &str) -> ControllerResult<Pod> {
        Ok(self.store.get_pod(tenant_id, name).await?)
    }

    pub async fn pod_logs(
        &self,
        tenant_id: &str,
        name: &str,
        container: Option<&str>,
    ) -> ControllerResult<String> {
        Ok(self.store.pod_logs(tenant_id, name, container).await?)
    }

    pub async fn list_endpoints(&self, tenant_id: &str) -> ControllerResult<Vec<Service>> {
        Ok(self.store.list_services(tenant_id).await?)
    }

    pub async fn list_routes(&self, tenant_id: &str) -> ControllerResult<Vec<Ingress>> {
        Ok(self.store.list_ingresses(tenant_id).await?)
    }

    pub async fn list_workloads(&self, tenant_id: &str) -> ControllerResult<Vec<Deployment>> {
        Ok(self.store.list_deployments(tenant_id).await?)
    }

    /// Everything running in a tenant, grouped per workload.
    ///
    /// The four listings run concurrently; a failed listing is reported in
    /// `unavailable` and treated as empty.
    pub async fn tenant_overview(&self, tenant_id: &str) -> ControllerResult<TenantOverview> {
        if let Err(e) = self.store.get_namespace(tenant_id).await {
            return Err(if e.is_not_found() {
                ControllerError::TenantNotFound(tenant_id.to_string())
            } else {
                e.into()
            });
        }

        let (pods, services, ingresses, deployments) = tokio::join!(
            self.store.list_pods(tenant_id),
            self.store.list_services(tenant_id),
            self.store.list_ingresses(tenant_id),
            self.store.list_deployments(tenant_id),
        );

        let mut unavailable = Vec::new();
        let pods = tolerate("pods", tenant_id, pods, &mut unavailable);
        let services = tolerate("services", tenant_id, services, &mut unavailable);
        let ingresses = tolerate("ingresses", tenant_id, ingresses, &mut unavailable);
        let deployments = tolerate("deployments", tenant_id, deployments, &mut unavailable);

        let mut matched = vec![false; pods.len()];
        let workloads = deployments
            .iter()
            .map(|deployment| {
                let name = accessors::name(&deployment.metadata);
                let app = accessors::app_label(&deployment.metadata)
                    .map(str::to_string)
                    .unwrap_or_else(|| name.clone());
                let belongs = |meta: &ObjectMeta| {
                    accessors::app_label(meta) == Some(app.as_str())
                        || accessors::name(meta) == name
                };

                let workload_pods = pods
                    .iter()
                    .enumerate()
                    .filter(|(_, pod)| accessors::app_label(&pod.metadata) == Some(app.as_str()))
                    .map(|(index, pod)| {
                        matched[index] = true;
                        pod_summary(pod)
                    })
                    .collect();

                WorkloadSummary {
                    replicas: accessors::replicas(deployment),
                    ready_replicas: accessors::ready_replicas(deployment),
                    pods: workload_pods,
                    service_ports: services
                        .iter()
                        .filter(|service| belongs(&service.metadata))
                        .flat_map(accessors::service_ports)
                        .collect(),
                    hosts: ingresses
                        .iter()
                        .filter(|ingress| {
                            belongs(&ingress.metadata)
                                || accessors::ingress_backend(ingress) == Some(name.as_str())
                        })
                        .flat_map(accessors::ingress_hosts)
                        .collect(),
                    name,
                }
            })
            .collect();

        let unmatched_pods = pods
            .iter()
            .zip(matched)
            .filter(|(_, matched)| !matched)
            .map(|(pod, _)| pod_summary(pod))
            .collect();

        Ok(TenantOverview {
            namespace: tenant_id.to_string(),
            workloads,
            unmatched_pods,
            unavailable,
        })
    }
}
