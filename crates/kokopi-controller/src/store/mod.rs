/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Resource Store Module
//!
//! The controller keeps no state of its own: every read and write goes through a
//! [`ResourceStore`]. The production implementation talks to the Kubernetes API
//! server through `kube`; [`MemoryStore`] mimics its observable behaviour
//! (resource versions, asynchronous namespace termination, cascading deletes)
//! for tests.
//!
//! Implementations must:
//! - report a missing object as [`StoreError::NotFound`], distinct from other failures
//! - reject a replace carrying a stale `resourceVersion` with [`StoreError::Conflict`]
//! - eventually delete everything scoped to a namespace once the namespace is deleted

mod kubernetes;
mod memory;

pub use kubernetes::{create_k8s_client, KubeStore};
pub use memory::{MemoryStore, TerminationBehaviour};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Pod, Service};
use k8s_openapi::api::networking::v1::Ingress;

/// Result type alias using [`StoreError`].
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The addressed object does not exist.
    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },

    /// The write was rejected because the object changed or already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other failure (transport, validation, quota).
    #[error("{0}")]
    Api(String),
}

impl StoreError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Namespaced create/read/list/replace/delete over the four resource kinds the
/// controller composes, plus the pod reads the directory needs.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Cheap reachability check used by the readiness probe.
    async fn ping(&self) -> StoreResult<()>;

    async fn create_namespace(&self, namespace: &Namespace) -> StoreResult<Namespace>;

    async fn get_namespace(&self, name: &str) -> StoreResult<Namespace>;

    /// Lists namespaces matching an equality label selector (`key=value[,key=value]`).
    async fn list_namespaces(&self, label_selector: &str) -> StoreResult<Vec<Namespace>>;

    async fn replace_namespace(&self, namespace: &Namespace) -> StoreResult<Namespace>;

    /// Requests deletion. Completion is asynchronous; poll [`Self::get_namespace`].
    async fn delete_namespace(&self, name: &str) -> StoreResult<()>;

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> StoreResult<Deployment>;

    async fn get_deployment(&self, namespace: &str, name: &str) -> StoreResult<Deployment>;

    async fn list_deployments(&self, namespace: &str) -> StoreResult<Vec<Deployment>>;

    async fn replace_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> StoreResult<Deployment>;

    async fn create_service(&self, namespace: &str, service: &Service) -> StoreResult<Service>;

    async fn list_services(&self, namespace: &str) -> StoreResult<Vec<Service>>;

    async fn create_ingress(&self, namespace: &str, ingress: &Ingress) -> StoreResult<Ingress>;

    async fn list_ingresses(&self, namespace: &str) -> StoreResult<Vec<Ingress>>;

    /// Ingresses of every namespace, managed or not.
    async fn list_all_ingresses(&self) -> StoreResult<Vec<Ingress>>;

    async fn list_pods(&self, namespace: &str) -> StoreResult<Vec<Pod>>;

    async fn get_pod(&self, namespace: &str, name: &str) -> StoreResult<Pod>;

    async fn pod_logs(
        &self,
        namespace: &str,
        name: &str,
        container: Option<&str>,
    ) -> StoreResult<String>;
}

/// Parses an equality-based label selector into key/value pairs.
///
/// Only `key=value` terms joined by commas are understood; that is the only form
/// the controller issues.
pub fn parse_label_selector(selector: &str) -> Vec<(&str, &str)> {
    selector
        .split(',')
        .filter_map(|term| {
            let term = term.trim();
            let (key, value) = term.split_once('=')?;
            Some((key.trim(), value.trim_start_matches('=').trim()))
        })
        .collect()
}
