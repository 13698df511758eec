/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Total accessors over the optional-heavy `k8s-openapi` records.
//!
//! Live objects may lack any optional field; these helpers return an empty or
//! default value instead of failing.

use super::objects::{
    restore_repository_url, APP_LABEL, CLONE_CONTAINER, DEPLOYED_AT_LABEL, DEPLOY_USER_LABEL,
    REPOSITORY_ANNOTATION, REPOSITORY_LABEL,
};
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, EnvVar, Namespace, Pod, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kokopi_models::models::EnvEntry;
use std::collections::BTreeMap;

pub fn name(meta: &ObjectMeta) -> String {
    meta.name.clone().unwrap_or_default()
}

pub fn label<'a>(meta: &'a ObjectMeta, key: &str) -> Option<&'a str> {
    meta.labels.as_ref()?.get(key).map(String::as_str)
}

pub fn annotation<'a>(meta: &'a ObjectMeta, key: &str) -> Option<&'a str> {
    meta.annotations.as_ref()?.get(key).map(String::as_str)
}

pub fn namespace_phase(namespace: &Namespace) -> Option<&str> {
    namespace.status.as_ref()?.phase.as_deref()
}

/// Repository URL recorded on a tenant: the exact annotation when present,
/// otherwise the restored label.
pub fn tenant_repository(namespace: &Namespace) -> Option<String> {
    annotation(&namespace.metadata, REPOSITORY_ANNOTATION)
        .map(str::to_string)
        .or_else(|| label(&namespace.metadata, REPOSITORY_LABEL).map(restore_repository_url))
}

pub fn tenant_deploy_user(namespace: &Namespace) -> Option<String> {
    annotation(&namespace.metadata, DEPLOY_USER_LABEL)
        .or_else(|| label(&namespace.metadata, DEPLOY_USER_LABEL))
        .map(str::to_string)
}

pub fn tenant_deployed_at(namespace: &Namespace) -> Option<DateTime<Utc>> {
    let seconds = label(&namespace.metadata, DEPLOYED_AT_LABEL)?.parse().ok()?;
    DateTime::from_timestamp(seconds, 0)
}

/// The `app` identity label of any object.
pub fn app_label(meta: &ObjectMeta) -> Option<&str> {
    label(meta, APP_LABEL)
}

fn containers(deployment: &Deployment) -> &[Container] {
    deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.template.spec.as_ref())
        .map(|pod| pod.containers.as_slice())
        .unwrap_or_default()
}

/// The container running the application: the one named `container_name`, or
/// the first container when none carries that name.
pub fn main_container<'a>(deployment: &'a Deployment, container_name: &str) -> Option<&'a Container> {
    let containers = containers(deployment);
    containers
        .iter()
        .find(|c| c.name == container_name)
        .or_else(|| containers.first())
}

pub fn main_container_mut<'a>(
    deployment: &'a mut Deployment,
    container_name: &str,
) -> Option<&'a mut Container> {
    let containers = &mut deployment.spec.as_mut()?.template.spec.as_mut()?.containers;
    let index = containers
        .iter()
        .position(|c| c.name == container_name)
        .unwrap_or(0);
    containers.get_mut(index)
}

pub fn clone_container_mut(deployment: &mut Deployment) -> Option<&mut Container> {
    deployment
        .spec
        .as_mut()?
        .template
        .spec
        .as_mut()?
        .init_containers
        .as_mut()?
        .iter_mut()
        .find(|c| c.name == CLONE_CONTAINER)
}

/// Env list of the main container, in order. Entries sourced through
/// `valueFrom` carry an empty value.
pub fn container_env(deployment: &Deployment, container_name: &str) -> Vec<EnvEntry> {
    main_container(deployment, container_name)
        .and_then(|c| c.env.as_ref())
        .map(|env| env_entries(env))
        .unwrap_or_default()
}

pub fn env_entries(env: &[EnvVar]) -> Vec<EnvEntry> {
    env.iter()
        .map(|var| EnvEntry::new(var.name.clone(), var.value.clone().unwrap_or_default()))
        .collect()
}

pub fn replicas(deployment: &Deployment) -> i32 {
    deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(1)
}

pub fn ready_replicas(deployment: &Deployment) -> i32 {
    deployment
        .status
        .as_ref()
        .and_then(|status| status.ready_replicas)
        .unwrap_or(0)
}

pub fn template_annotations(deployment: &Deployment) -> BTreeMap<String, String> {
    deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.template.metadata.as_ref())
        .and_then(|meta| meta.annotations.clone())
        .unwrap_or_default()
}

/// Sets an annotation on the pod template, creating metadata as needed.
pub fn set_template_annotation(deployment: &mut Deployment, key: &str, value: String) {
    let spec = deployment.spec.get_or_insert_with(Default::default);
    spec.template
        .metadata
        .get_or_insert_with(Default::default)
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(key.to_string(), value);
}

pub fn service_ports(service: &Service) -> Vec<i32> {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_ref())
        .map(|ports| ports.iter().map(|p| p.port).collect())
        .unwrap_or_default()
}

/// Every hostname named by the ingress rules, in rule order.
pub fn ingress_hosts(ingress: &Ingress) -> Vec<String> {
    ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.rules.as_ref())
        .map(|rules| rules.iter().filter_map(|rule| rule.host.clone()).collect())
        .unwrap_or_default()
}

/// The service an ingress routes to, from its first backend.
pub fn ingress_backend(ingress: &Ingress) -> Option<&str> {
    ingress
        .spec
        .as_ref()?
        .rules
        .as_ref()?
        .iter()
        .filter_map(|rule| rule.http.as_ref())
        .flat_map(|http| http.paths.iter())
        .find_map(|path| path.backend.service.as_ref())
        .map(|service| service.name.as_str())
}

pub fn pod_phase(pod: &Pod) -> Option<String> {
    pod.status.as_ref()?.phase.clone()
}

pub fn pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

pub fn pod_restarts(pod: &Pod) -> i32 {
    pod.status
        .as_ref()
        .and_then(|status| status.container_statuses.as_ref())
        .map(|statuses| statuses.iter().map(|s| s.restart_count).sum())
        .unwrap_or(0)
}
