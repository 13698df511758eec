/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Deployments Module
//!
//! Payloads of the deploy, update and delete operations. Field names are
//! camelCase on the wire to match the panel that drives the API.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A container port exposed by the workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortConfig {
    pub container_port: i32,
}

/// An external hostname routed to one of the workload's ports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    pub hostname: String,
    /// Path prefix, "/" when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Container port receiving the traffic; the first declared port when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<i32>,
}

/// Body of `POST /api/deploy`
///
/// The simple form carries a single `host`; `ports` and `hosts` are the advanced
/// form and take precedence when present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    pub namespace: String,
    pub repo_url: String,
    /// `KEY=VALUE` lines
    #[serde(default)]
    pub env_vars: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub ports: Option<Vec<PortConfig>>,
    #[serde(default)]
    pub hosts: Option<Vec<HostConfig>>,
    #[serde(default)]
    pub replicas: Option<i32>,
    /// Recorded on the tenant; "admin" when omitted
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResponse {
    pub message: String,
    /// Generated workload name
    pub pod_name: String,
    pub namespace: String,
}

/// Body of `PATCH /api/namespace/:ns/deployment/:name/env`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchEnvRequest {
    #[serde(default)]
    pub env_vars: String,
}

/// Body of `POST /api/namespace/:ns/deployment/:name/redeploy`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeployRequest {
    pub repo_url: String,
}

/// Outcome of a tenant deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStatus {
    /// The namespace is gone
    Deleted,
    /// The namespace was observed in its terminating phase
    Terminating,
    /// Deletion was accepted but not yet observed in progress
    Pending,
}

impl fmt::Display for DeleteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeleteStatus::Deleted => "deleted",
            DeleteStatus::Terminating => "terminating",
            DeleteStatus::Pending => "pending",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub message: String,
    pub namespace: String,
    pub status: DeleteStatus,
    /// Number of status reads performed after the delete was issued
    pub polls: u32,
}
