/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Validation and defaulting of deploy requests.
//!
//! A [`DeploymentPlan`] is everything the builders need, already checked: no
//! store call is made for a request that fails here.

use crate::error::{ControllerError, ControllerResult};
use crate::k8s::objects::{slug_from_repository, RouteTarget, DEFAULT_DEPLOY_USER};
use kokopi_models::models::{env, DeployRequest, EnvEntry};
use kokopi_utils::config;

const MAX_LABEL_LEN: usize = 63;

/// Routing values applied when a request leaves them out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDefaults {
    pub ingress_class: String,
    pub container_port: i32,
    pub path: String,
}

impl Default for RoutingDefaults {
    fn default() -> Self {
        Self {
            ingress_class: "nginx".to_string(),
            container_port: 3000,
            path: "/".to_string(),
        }
    }
}

impl From<&config::Routing> for RoutingDefaults {
    fn from(routing: &config::Routing) -> Self {
        Self {
            ingress_class: routing.ingress_class.clone(),
            container_port: routing.default_container_port,
            path: routing.default_path.clone(),
        }
    }
}

/// A validated deploy request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPlan {
    pub tenant_id: String,
    pub repo_url: String,
    pub env: Vec<EnvEntry>,
    pub ports: Vec<i32>,
    pub routes: Vec<RouteTarget>,
    pub replicas: i32,
    pub user: String,
}

impl DeploymentPlan {
    /// Hostnames in route order, duplicates removed.
    pub fn hostnames(&self) -> Vec<String> {
        let mut hosts: Vec<String> = Vec::new();
        for route in &self.routes {
            if !hosts.contains(&route.host) {
                hosts.push(route.host.clone());
            }
        }
        hosts
    }
}

/// DNS-1123 label: lowercase alphanumerics and '-', alphanumeric at both ends.
pub fn is_dns_label(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_LABEL_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !value.starts_with('-')
        && !value.ends_with('-')
}

fn is_hostname(value: &str) -> bool {
    if value.len() > 253 {
        return false;
    }
    let rest = value.strip_prefix("*.").unwrap_or(value);
    !rest.is_empty() && rest.split('.').all(is_dns_label)
}

pub fn validate_tenant_id(tenant_id: &str) -> ControllerResult<()> {
    if is_dns_label(tenant_id) {
        Ok(())
    } else {
        Err(ControllerError::invalid(
            "namespace",
            format!(
                "{:?} must be 1-63 lowercase alphanumerics or '-', starting and ending alphanumeric",
                tenant_id
            ),
        ))
    }
}

/// Checks the repository URL is present and names a repository.
pub fn validate_repo_url(repo_url: &str) -> ControllerResult<String> {
    let repo_url = repo_url.trim();
    if repo_url.is_empty() {
        return Err(ControllerError::invalid("repoUrl", "must not be empty"));
    }
    slug_from_repository(repo_url)?;
    Ok(repo_url.to_string())
}

fn normalise_ports(request: &DeployRequest, defaults: &RoutingDefaults) -> ControllerResult<Vec<i32>> {
    let ports: Vec<i32> = match &request.ports {
        Some(ports) if !ports.is_empty() => ports.iter().map(|p| p.container_port).collect(),
        _ => vec![defaults.container_port],
    };

    for (index, port) in ports.iter().enumerate() {
        if !(1..=65535).contains(port) {
            return Err(ControllerError::invalid(
                "ports",
                format!("{} is not a valid port", port),
            ));
        }
        if ports[..index].contains(port) {
            return Err(ControllerError::invalid(
                "ports",
                format!("{} is declared more than once", port),
            ));
        }
    }
    Ok(ports)
}

fn normalise_routes(
    request: &DeployRequest,
    ports: &[i32],
    defaults: &RoutingDefaults,
) -> ControllerResult<Vec<RouteTarget>> {
    let first_port = ports.first().copied().unwrap_or(defaults.container_port);

    let (field, raw): (&'static str, Vec<(String, Option<String>, Option<i32>)>) =
        match (&request.hosts, &request.host) {
            (Some(hosts), _) if !hosts.is_empty() => (
                "hosts",
                hosts
                    .iter()
                    .map(|h| (h.hostname.clone(), h.path.clone(), h.target_port))
                    .collect(),
            ),
            (_, Some(host)) if !host.trim().is_empty() => ("host", vec![(host.clone(), None, None)]),
            _ => {
                return Err(ControllerError::invalid(
                    "host",
                    "at least one hostname is required",
                ))
            }
        };

    raw.into_iter()
        .map(|(hostname, path, target_port)| {
            let host = hostname.trim().to_lowercase();
            if !is_hostname(&host) {
                return Err(ControllerError::invalid(
                    field,
                    format!("{:?} is not a valid hostname", hostname),
                ));
            }

            let path = path
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| defaults.path.clone());
            if !path.starts_with('/') {
                return Err(ControllerError::invalid(
                    field,
                    format!("path {:?} must start with '/'", path),
                ));
            }

            let port = target_port.unwrap_or(first_port);
            if !ports.contains(&port) {
                return Err(ControllerError::invalid(
                    field,
                    format!("target port {} is not a declared container port", port),
                ));
            }

            Ok(RouteTarget { host, path, port })
        })
        .collect()
}

/// Validates a deploy request and fills in every default.
pub fn normalise(
    request: &DeployRequest,
    defaults: &RoutingDefaults,
) -> ControllerResult<DeploymentPlan> {
    let tenant_id = request.namespace.trim().to_string();
    validate_tenant_id(&tenant_id)?;
    let repo_url = validate_repo_url(&request.repo_url)?;

    let replicas = request.replicas.unwrap_or(1);
    if replicas < 0 {
        return Err(ControllerError::invalid("replicas", "must not be negative"));
    }

    let ports = normalise_ports(request, defaults)?;
    let routes = normalise_routes(request, &ports, defaults)?;

    let user = request
        .user
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(DEFAULT_DEPLOY_USER)
        .to_string();

    Ok(DeploymentPlan {
        tenant_id,
        repo_url,
        env: env::decode(request.env_vars.as_deref().unwrap_or_default()),
        ports,
        routes,
        replicas,
        user,
    })
}
