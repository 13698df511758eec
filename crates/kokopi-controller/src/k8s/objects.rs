/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Builders for tenant, workload, endpoint and route objects.
//!
//! Every function here is pure: the creation time is passed in, nothing talks
//! to the cluster.

use crate::error::{ControllerError, ControllerResult};
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EmptyDirVolumeSource, EnvVar, Namespace, PodSpec, PodTemplateSpec,
    Service, ServicePort, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kokopi_models::models::EnvEntry;
use kokopi_utils::config;
use std::collections::BTreeMap;
use url::Url;

pub static MANAGED_LABEL: &str = "kokopi.io/managed";
pub static REPOSITORY_LABEL: &str = "kokopi.io/repository";
pub static REPOSITORY_ANNOTATION: &str = "kokopi.io/repository-url";
pub static DEPLOY_USER_LABEL: &str = "kokopi.io/deploy-user";
pub static DEPLOYED_AT_LABEL: &str = "kokopi.io/deployed-at";
pub static NAME_LABEL: &str = "name";
pub static APP_LABEL: &str = "app";
pub static RESTARTED_AT_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";
pub static CLONE_CONTAINER: &str = "git-clone";
pub static APP_VOLUME: &str = "app-volume";

/// Selector matching every namespace this controller created.
pub static MANAGED_SELECTOR: &str = "kokopi.io/managed=true";

pub const DEFAULT_CONTAINER_PORT: i32 = 3000;
pub const DEFAULT_DEPLOY_USER: &str = "admin";
const MAX_SLUG_LEN: usize = 49;
const MAX_LABEL_VALUE_LEN: usize = 63;

/// Images and commands the workload runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeProfile {
    pub clone_image: String,
    pub run_image: String,
    pub run_command: String,
    pub working_dir: String,
    pub container_name: String,
}

impl Default for RuntimeProfile {
    fn default() -> Self {
        Self {
            clone_image: "alpine/git:latest".to_string(),
            run_image: "node:18".to_string(),
            run_command: "npm install && npm run build && npm run start".to_string(),
            working_dir: "/app".to_string(),
            container_name: "app".to_string(),
        }
    }
}

impl From<&config::Runtime> for RuntimeProfile {
    fn from(runtime: &config::Runtime) -> Self {
        Self {
            clone_image: runtime.clone_image.clone(),
            run_image: runtime.run_image.clone(),
            run_command: runtime.run_command.clone(),
            working_dir: runtime.working_dir.clone(),
            container_name: runtime.container_name.clone(),
        }
    }
}

/// One hostname/path routed to a container port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    pub host: String,
    pub path: String,
    pub port: i32,
}

/// Wraps a string in single quotes for `sh`, escaping embedded quotes.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Clone the repository into `dir`, or pull when a checkout already exists.
pub fn clone_command(repo_url: &str, dir: &str) -> String {
    let git_dir = shell_quote(&format!("{}/.git", dir));
    let dir = shell_quote(dir);
    format!(
        "[ -d {git_dir} ] && (echo 'Repository already exists. Pulling latest changes...' && git -C {dir} pull) || (echo 'Repository not found. Cloning...' && git clone {url} {dir})",
        git_dir = git_dir,
        dir = dir,
        url = shell_quote(repo_url),
    )
}

/// Last non-empty path segment of a repository location.
///
/// Absolute URLs go through `Url`; scp-style remotes (`git@host:org/repo.git`)
/// and scheme-less locations are split on `/` and `:`.
fn last_segment(repo_url: &str) -> ControllerResult<String> {
    let segment = match Url::parse(repo_url) {
        Ok(url) => url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string),
        Err(e) => {
            if repo_url.is_empty() || repo_url.contains(char::is_whitespace) {
                return Err(ControllerError::invalid(
                    "repoUrl",
                    format!("not a valid URL: {}", e),
                ));
            }
            repo_url
                .split(['/', ':'])
                .skip(1)
                .filter(|s| !s.is_empty())
                .last()
                .map(str::to_string)
        }
    };
    segment.ok_or_else(|| ControllerError::invalid("repoUrl", "URL has no repository path"))
}

/// Derives the workload name prefix from the repository URL's last path segment.
pub fn slug_from_repository(repo_url: &str) -> ControllerResult<String> {
    let segment = last_segment(repo_url.trim())?;

    let stem = segment.split('.').next().unwrap_or_default().to_lowercase();
    let replaced: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();

    let mut slug = replaced.trim_matches('-').to_string();
    if slug.is_empty() {
        return Err(ControllerError::invalid(
            "repoUrl",
            format!("cannot derive a name from {:?}", segment),
        ));
    }
    if !slug.starts_with(|c: char| c.is_ascii_lowercase()) {
        slug = format!("app-{}", slug);
    }
    slug.truncate(MAX_SLUG_LEN);
    Ok(slug.trim_end_matches('-').to_string())
}

/// Whether `value` is acceptable as a Kubernetes label value.
pub fn is_valid_label_value(value: &str) -> bool {
    if value.is_empty() {
        return true;
    }
    value.len() <= MAX_LABEL_VALUE_LEN
        && value.starts_with(|c: char| c.is_ascii_alphanumeric())
        && value.ends_with(|c: char| c.is_ascii_alphanumeric())
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// `https://github.com/acme/widget` -> `github.com_acme_widget`
pub fn sanitize_repository_url(repo_url: &str) -> String {
    let without_scheme = match repo_url.split_once("://") {
        Some((_, rest)) => rest,
        None => repo_url,
    };
    without_scheme.replace('/', "_")
}

/// Inverse of [`sanitize_repository_url`] for URLs without underscores.
pub fn restore_repository_url(label: &str) -> String {
    format!("https://{}", label.replace('_', "/"))
}

fn app_labels(workload_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), workload_name.to_string())])
}

fn effective_ports(ports: &[i32]) -> Vec<i32> {
    if ports.is_empty() {
        vec![DEFAULT_CONTAINER_PORT]
    } else {
        ports.to_vec()
    }
}

/// Converts decoded entries to container env vars, preserving order.
pub fn env_vars(env: &[EnvEntry]) -> Vec<EnvVar> {
    env.iter()
        .map(|entry| EnvVar {
            name: entry.name.clone(),
            value: Some(entry.value.clone()),
            ..EnvVar::default()
        })
        .collect()
}

/// Builds the workload: clone into a shared volume, then install, build and start.
pub fn build_workload(
    repo_url: &str,
    env: &[EnvEntry],
    ports: &[i32],
    replicas: i32,
    tenant_id: &str,
    runtime: &RuntimeProfile,
    created_at: DateTime<Utc>,
) -> ControllerResult<Deployment> {
    let name = format!(
        "{}-{}",
        slug_from_repository(repo_url)?,
        created_at.timestamp_millis()
    );
    let labels = app_labels(&name);

    let volume_mount = VolumeMount {
        name: APP_VOLUME.to_string(),
        mount_path: runtime.working_dir.clone(),
        ..VolumeMount::default()
    };

    let clone = Container {
        name: CLONE_CONTAINER.to_string(),
        image: Some(runtime.clone_image.clone()),
        command: Some(vec!["sh".to_string(), "-c".to_string()]),
        args: Some(vec![clone_command(repo_url, &runtime.working_dir)]),
        volume_mounts: Some(vec![volume_mount.clone()]),
        ..Container::default()
    };

    let app = Container {
        name: runtime.container_name.clone(),
        image: Some(runtime.run_image.clone()),
        working_dir: Some(runtime.working_dir.clone()),
        command: Some(vec!["bash".to_string(), "-c".to_string()]),
        args: Some(vec![runtime.run_command.clone()]),
        volume_mounts: Some(vec![volume_mount]),
        env: Some(env_vars(env)),
        ports: Some(
            effective_ports(ports)
                .into_iter()
                .map(|port| ContainerPort {
                    container_port: port,
                    ..ContainerPort::default()
                })
                .collect(),
        ),
        ..Container::default()
    };

    Ok(Deployment {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(tenant_id.to_string()),
            labels: Some(labels.clone()),
            ..ObjectMeta::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    volumes: Some(vec![Volume {
                        name: APP_VOLUME.to_string(),
                        empty_dir: Some(EmptyDirVolumeSource::default()),
                        ..Volume::default()
                    }]),
                    init_containers: Some(vec![clone]),
                    containers: vec![app],
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    })
}

/// Builds the ClusterIP service, one `port == targetPort` mapping per container port.
pub fn build_endpoint(workload_name: &str, ports: &[i32], tenant_id: &str) -> Service {
    let service_ports = effective_ports(ports)
        .into_iter()
        .map(|port| ServicePort {
            name: Some(format!("http-{}", port)),
            port,
            target_port: Some(IntOrString::Int(port)),
            protocol: Some("TCP".to_string()),
            ..ServicePort::default()
        })
        .collect();

    Service {
        metadata: ObjectMeta {
            name: Some(workload_name.to_string()),
            namespace: Some(tenant_id.to_string()),
            labels: Some(app_labels(workload_name)),
            ..ObjectMeta::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(app_labels(workload_name)),
            ports: Some(service_ports),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }
}

/// Builds the ingress with one rule per distinct hostname.
///
/// Targets sharing a hostname become additional paths of the same rule.
pub fn build_route(
    workload_name: &str,
    targets: &[RouteTarget],
    tenant_id: &str,
    ingress_class: &str,
) -> Ingress {
    let mut rules: Vec<IngressRule> = Vec::new();

    for target in targets {
        let path = HTTPIngressPath {
            path: Some(target.path.clone()),
            path_type: "Prefix".to_string(),
            backend: IngressBackend {
                service: Some(IngressServiceBackend {
                    name: workload_name.to_string(),
                    port: Some(ServiceBackendPort {
                        number: Some(target.port),
                        ..ServiceBackendPort::default()
                    }),
                }),
                ..IngressBackend::default()
            },
        };

        let existing = rules
            .iter_mut()
            .find(|rule| rule.host.as_deref() == Some(target.host.as_str()));
        match existing.and_then(|rule| rule.http.as_mut()) {
            Some(http) => http.paths.push(path),
            None => rules.push(IngressRule {
                host: Some(target.host.clone()),
                http: Some(HTTPIngressRuleValue { paths: vec![path] }),
            }),
        }
    }

    Ingress {
        metadata: ObjectMeta {
            name: Some(workload_name.to_string()),
            namespace: Some(tenant_id.to_string()),
            labels: Some(app_labels(workload_name)),
            ..ObjectMeta::default()
        },
        spec: Some(IngressSpec {
            ingress_class_name: Some(ingress_class.to_string()),
            rules: Some(rules),
            ..IngressSpec::default()
        }),
        ..Ingress::default()
    }
}

/// Applies the repository label and annotation to tenant metadata.
///
/// The label carries the sanitized form when it is a valid label value; the
/// annotation always carries the exact URL.
pub fn set_repository(meta: &mut ObjectMeta, repo_url: &str) {
    let labels = meta.labels.get_or_insert_with(BTreeMap::new);
    let sanitized = sanitize_repository_url(repo_url);
    if is_valid_label_value(&sanitized) {
        labels.insert(REPOSITORY_LABEL.to_string(), sanitized);
    } else {
        labels.remove(REPOSITORY_LABEL);
    }

    meta.annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(REPOSITORY_ANNOTATION.to_string(), repo_url.to_string());
}

/// Builds the tenant namespace with its ownership and provenance labels.
pub fn build_tenant(
    tenant_id: &str,
    repo_url: &str,
    user: &str,
    created_at: DateTime<Utc>,
) -> Namespace {
    let mut labels = BTreeMap::from([
        (NAME_LABEL.to_string(), tenant_id.to_string()),
        (MANAGED_LABEL.to_string(), "true".to_string()),
        (
            DEPLOYED_AT_LABEL.to_string(),
            created_at.timestamp().to_string(),
        ),
    ]);
    let mut annotations = BTreeMap::new();
    if is_valid_label_value(user) {
        labels.insert(DEPLOY_USER_LABEL.to_string(), user.to_string());
    }
    annotations.insert(DEPLOY_USER_LABEL.to_string(), user.to_string());

    let mut metadata = ObjectMeta {
        name: Some(tenant_id.to_string()),
        labels: Some(labels),
        annotations: Some(annotations),
        ..ObjectMeta::default()
    };
    set_repository(&mut metadata, repo_url);

    Namespace {
        metadata,
        ..Namespace::default()
    }
}
