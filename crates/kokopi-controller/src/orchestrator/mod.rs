/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Deployment Orchestrator
//!
//! Composes tenant, workload, endpoint and route into one deploy operation and
//! drives the update and teardown transitions against the [`ResourceStore`].
//!
//! ## Deploy
//!
//! 1. Validate and normalise the request ([`request::normalise`])
//! 2. Check every requested hostname is free across the cluster
//! 3. Create the namespace, then the deployment, service and ingress
//!
//! The first failing step aborts the operation. Objects created by earlier steps
//! are left in place.
//!
//! ## Updates
//!
//! Environment patch, restart and redeploy are read-modify-write on the
//! deployment. The write carries the `resourceVersion` that was read, so a
//! concurrent change surfaces as [`ControllerError::Conflict`] instead of being
//! overwritten.
//!
//! ## Deletion
//!
//! Deleting the namespace is asynchronous in Kubernetes. The orchestrator issues
//! the delete, then polls the namespace a bounded number of times and reports
//! the last state it observed.

pub mod request;

use crate::error::{ControllerError, ControllerResult};
use crate::hostnames;
use crate::k8s::accessors;
use crate::k8s::objects::{
    build_endpoint, build_route, build_tenant, build_workload, clone_command, env_vars,
    set_repository, RuntimeProfile, RESTARTED_AT_ANNOTATION,
};
use crate::metrics;
use crate::store::{ResourceStore, StoreError};
use chrono::Utc;
use k8s_openapi::api::apps::v1::Deployment;
use kokopi_models::models::{env, DeleteStatus, DeployRequest, DeployResponse, EnvEntry};
use kokopi_utils::logging::prelude::*;
use kokopi_utils::Settings;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

pub use request::{normalise, DeploymentPlan, RoutingDefaults};

/// How long to wait for a deleted namespace to disappear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionPolicy {
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl Default for DeletionPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_attempts: 10,
        }
    }
}

/// Result of a tenant deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub status: DeleteStatus,
    /// Status reads issued after the delete.
    pub polls: u32,
}

/// A workload as the detail view shows it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentDetail {
    pub deployment: Deployment,
    pub env_vars: Vec<EnvEntry>,
    /// `env_vars` rendered as `KEY=VALUE` lines, ready for editing
    pub env_text: String,
    pub repository_url: Option<String>,
}

fn observe<T>(operation: &str, result: ControllerResult<T>) -> ControllerResult<T> {
    match &result {
        Ok(_) => metrics::record_operation(operation, "success"),
        Err(e) => metrics::record_operation(operation, e.kind()),
    }
    result
}

pub struct Orchestrator {
    store: Arc<dyn ResourceStore>,
    runtime: RuntimeProfile,
    routing: RoutingDefaults,
    deletion: DeletionPolicy,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        runtime: RuntimeProfile,
        routing: RoutingDefaults,
        deletion: DeletionPolicy,
    ) -> Self {
        Self {
            store,
            runtime,
            routing,
            deletion,
        }
    }

    pub fn from_settings(store: Arc<dyn ResourceStore>, settings: &Settings) -> Self {
        Self::new(
            store,
            RuntimeProfile::from(&settings.runtime),
            RoutingDefaults::from(&settings.routing),
            DeletionPolicy {
                poll_interval: settings.deletion.poll_interval(),
                max_attempts: settings.deletion.max_attempts,
            },
        )
    }

    pub fn runtime(&self) -> &RuntimeProfile {
        &self.runtime
    }

    pub fn routing(&self) -> &RoutingDefaults {
        &self.routing
    }

    /// Provisions a new tenant with its workload, endpoint and route.
    pub async fn deploy(&self, request: &DeployRequest) -> ControllerResult<DeployResponse> {
        observe("deploy", self.deploy_inner(request).await)
    }

    async fn deploy_inner(&self, request: &DeployRequest) -> ControllerResult<DeployResponse> {
        let plan = normalise(request, &self.routing)?;
        info!(
            "Deploying {} into namespace {} ({} host(s), {} replica(s))",
            plan.repo_url,
            plan.tenant_id,
            plan.routes.len(),
            plan.replicas
        );

        hostnames::ensure_available(self.store.as_ref(), &plan.hostnames()).await?;

        let created_at = Utc::now();
        let workload = build_workload(
            &plan.repo_url,
            &plan.env,
            &plan.ports,
            plan.replicas,
            &plan.tenant_id,
            &self.runtime,
            created_at,
        )?;
        let workload_name = accessors::name(&workload.metadata);

        let tenant = build_tenant(&plan.tenant_id, &plan.repo_url, &plan.user, created_at);
        self.store.create_namespace(&tenant).await.map_err(|e| {
            error!("Failed to create namespace {}: {}", plan.tenant_id, e);
            e
        })?;
        debug!("Created namespace {}", plan.tenant_id);

        self.store
            .create_deployment(&plan.tenant_id, &workload)
            .await
            .map_err(|e| {
                error!("Failed to create deployment {}: {}", workload_name, e);
                e
            })?;

        let endpoint = build_endpoint(&workload_name, &plan.ports, &plan.tenant_id);
        self.store
            .create_service(&plan.tenant_id, &endpoint)
            .await
            .map_err(|e| {
                error!("Failed to create service {}: {}", workload_name, e);
                e
            })?;

        let route = build_route(
            &workload_name,
            &plan.routes,
            &plan.tenant_id,
            &self.routing.ingress_class,
        );
        self.store
            .create_ingress(&plan.tenant_id, &route)
            .await
            .map_err(|e| {
                error!("Failed to create ingress {}: {}", workload_name, e);
                e
            })?;

        info!(
            "Deployment {} created in namespace {}",
            workload_name, plan.tenant_id
        );
        Ok(DeployResponse {
            message: format!("Deployment {} created successfully", workload_name),
            pod_name: workload_name,
            namespace: plan.tenant_id,
        })
    }

    /// Maps a store error on a workload read to the right not-found flavour.
    async fn resolve_missing(&self, tenant_id: &str, err: StoreError) -> ControllerError {
        if !err.is_not_found() {
            return err.into();
        }
        match self.store.get_namespace(tenant_id).await {
            Err(ns_err) if ns_err.is_not_found() => {
                ControllerError::TenantNotFound(tenant_id.to_string())
            }
            _ => err.into(),
        }
    }

    async fn load_deployment(&self, tenant_id: &str, name: &str) -> ControllerResult<Deployment> {
        match self.store.get_deployment(tenant_id, name).await {
            Ok(deployment) => Ok(deployment),
            Err(err) => Err(self.resolve_missing(tenant_id, err).await),
        }
    }

    /// The workload, its environment, and the tenant's repository URL.
    pub async fn deployment_detail(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> ControllerResult<DeploymentDetail> {
        let deployment = self.load_deployment(tenant_id, name).await?;
        let env_vars = accessors::container_env(&deployment, &self.runtime.container_name);

        let repository_url = match self.store.get_namespace(tenant_id).await {
            Ok(namespace) => accessors::tenant_repository(&namespace),
            Err(e) if e.is_not_found() => {
                return Err(ControllerError::TenantNotFound(tenant_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        Ok(DeploymentDetail {
            env_text: env::encode(&env_vars),
            deployment,
            env_vars,
            repository_url,
        })
    }

    /// Replaces the main container's environment with the decoded text.
    pub async fn patch_env(
        &self,
        tenant_id: &str,
        name: &str,
        env_text: &str,
    ) -> ControllerResult<Deployment> {
        observe("patch_env", self.patch_env_inner(tenant_id, name, env_text).await)
    }

    async fn patch_env_inner(
        &self,
        tenant_id: &str,
        name: &str,
        env_text: &str,
    ) -> ControllerResult<Deployment> {
        let entries = env::decode(env_text);
        let mut deployment = self.load_deployment(tenant_id, name).await?;

        let container = accessors::main_container_mut(&mut deployment, &self.runtime.container_name)
            .ok_or_else(|| ControllerError::ResourceNotFound {
                kind: "Container",
                name: self.runtime.container_name.clone(),
            })?;
        container.env = Some(env_vars(&entries));

        info!(
            "Replacing environment of {}/{} with {} variable(s)",
            tenant_id,
            name,
            entries.len()
        );
        Ok(self.store.replace_deployment(tenant_id, &deployment).await?)
    }

    /// Rolls the workload's pods by stamping the pod template.
    pub async fn restart(&self, tenant_id: &str, name: &str) -> ControllerResult<Deployment> {
        observe("restart", self.restart_inner(tenant_id, name).await)
    }

    async fn restart_inner(&self, tenant_id: &str, name: &str) -> ControllerResult<Deployment> {
        let mut deployment = self.load_deployment(tenant_id, name).await?;
        accessors::set_template_annotation(
            &mut deployment,
            RESTARTED_AT_ANNOTATION,
            Utc::now().to_rfc3339(),
        );
        info!("Restarting {}/{}", tenant_id, name);
        Ok(self.store.replace_deployment(tenant_id, &deployment).await?)
    }

    /// Points the workload at a new repository and restarts it.
    ///
    /// The tenant's repository label is rewritten afterwards in a separate
    /// write; if that write fails the workload has already been updated.
    pub async fn redeploy(
        &self,
        tenant_id: &str,
        name: &str,
        repo_url: &str,
    ) -> ControllerResult<Deployment> {
        observe("redeploy", self.redeploy_inner(tenant_id, name, repo_url).await)
    }

    async fn redeploy_inner(
        &self,
        tenant_id: &str,
        name: &str,
        repo_url: &str,
    ) -> ControllerResult<Deployment> {
        let repo_url = request::validate_repo_url(repo_url)?;
        let mut deployment = self.load_deployment(tenant_id, name).await?;

        let clone = accessors::clone_container_mut(&mut deployment).ok_or_else(|| {
            ControllerError::ResourceNotFound {
                kind: "Container",
                name: crate::k8s::objects::CLONE_CONTAINER.to_string(),
            }
        })?;
        let dir = clone
            .volume_mounts
            .as_ref()
            .and_then(|mounts| mounts.first())
            .map(|mount| mount.mount_path.clone())
            .unwrap_or_else(|| self.runtime.working_dir.clone());
        clone.args = Some(vec![clone_command(&repo_url, &dir)]);

        accessors::set_template_annotation(
            &mut deployment,
            RESTARTED_AT_ANNOTATION,
            Utc::now().to_rfc3339(),
        );

        info!("Redeploying {}/{} from {}", tenant_id, name, repo_url);
        let updated = self.store.replace_deployment(tenant_id, &deployment).await?;

        let mut namespace = match self.store.get_namespace(tenant_id).await {
            Ok(namespace) => namespace,
            Err(e) if e.is_not_found() => {
                return Err(ControllerError::TenantNotFound(tenant_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        set_repository(&mut namespace.metadata, &repo_url);
        self.store.replace_namespace(&namespace).await.map_err(|e| {
            warn!(
                "Deployment {}/{} updated but namespace relabel failed: {}",
                tenant_id, name, e
            );
            e
        })?;

        Ok(updated)
    }

    /// Deletes the tenant namespace and waits a bounded time for it to go.
    ///
    /// Running out of attempts is not an error: the outcome carries the last
    /// state observed.
    pub async fn delete_tenant(&self, tenant_id: &str) -> ControllerResult<DeleteOutcome> {
        let result = self.delete_tenant_inner(tenant_id).await;
        if let Ok(outcome) = &result {
            metrics::DELETE_POLL_ATTEMPTS
                .with_label_values(&[outcome.status.to_string().as_str()])
                .observe(f64::from(outcome.polls));
        }
        observe("delete", result)
    }

    async fn delete_tenant_inner(&self, tenant_id: &str) -> ControllerResult<DeleteOutcome> {
        let mut status = match self.store.get_namespace(tenant_id).await {
            Ok(namespace) if accessors::namespace_phase(&namespace) == Some("Terminating") => {
                DeleteStatus::Terminating
            }
            Ok(_) => DeleteStatus::Pending,
            Err(e) if e.is_not_found() => {
                return Err(ControllerError::TenantNotFound(tenant_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        match self.store.delete_namespace(tenant_id).await {
            Ok(()) => info!("Deletion of namespace {} requested", tenant_id),
            Err(e) if e.is_not_found() => {
                return Ok(DeleteOutcome {
                    status: DeleteStatus::Deleted,
                    polls: 0,
                })
            }
            Err(e) => return Err(e.into()),
        }

        let mut polls = 0;
        while polls < self.deletion.max_attempts {
            tokio::time::sleep(self.deletion.poll_interval).await;
            polls += 1;

            match self.store.get_namespace(tenant_id).await {
                Err(e) if e.is_not_found() => {
                    info!("Namespace {} deleted after {} poll(s)", tenant_id, polls);
                    return Ok(DeleteOutcome {
                        status: DeleteStatus::Deleted,
                        polls,
                    });
                }
                Err(e) => {
                    warn!(
                        "Status read {} of namespace {} failed, still {}: {}",
                        polls, tenant_id, status, e
                    );
                }
                Ok(namespace) => {
                    if accessors::namespace_phase(&namespace) == Some("Terminating") {
                        status = DeleteStatus::Terminating;
                    }
                    debug!(
                        "Namespace {} still present after poll {} ({})",
                        tenant_id, polls, status
                    );
                }
            }
        }

        warn!(
            "Namespace {} not gone after {} poll(s), reporting {}",
            tenant_id, polls, status
        );
        Ok(DeleteOutcome { status, polls })
    }
}
