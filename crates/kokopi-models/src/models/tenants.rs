/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Tenants Module
//!
//! Summaries the tenant directory renders for the panel. Everything here is
//! derived from live cluster state on each read; nothing is persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A managed namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSummary {
    pub name: String,
    /// Namespace phase ("Active", "Terminating"), when reported
    pub phase: Option<String>,
    pub repository_url: Option<String>,
    pub deploy_user: Option<String>,
    pub deployed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSummary {
    pub name: String,
    pub phase: Option<String>,
    pub ready: bool,
    pub restarts: i32,
}

/// One workload and the endpoint, route and pods sharing its identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSummary {
    pub name: String,
    pub replicas: i32,
    pub ready_replicas: i32,
    pub pods: Vec<PodSummary>,
    /// Service ports of the endpoint, empty when no endpoint exists
    pub service_ports: Vec<i32>,
    /// Hostnames of the route, empty when no route exists
    pub hosts: Vec<String>,
}

/// Aggregated view of one tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantOverview {
    pub namespace: String,
    pub workloads: Vec<WorkloadSummary>,
    /// Pods not selected by any workload
    pub unmatched_pods: Vec<PodSummary>,
    /// Queries that failed and were rendered empty
    pub unavailable: Vec<String>,
}
