/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Cross-tenant hostname uniqueness.
//!
//! The check reads every ingress in the cluster at call time and keeps nothing.
//! It is advisory: two deploys racing for the same hostname can both pass it.

use crate::error::{ControllerError, ControllerResult};
use crate::k8s::accessors;
use crate::store::ResourceStore;
use k8s_openapi::api::networking::v1::Ingress;
use kokopi_utils::logging::prelude::*;
use std::collections::HashSet;

/// Requested hostnames already routed by any of `existing`, deduplicated, in
/// request order.
pub fn find_conflicts(requested: &[String], existing: &[Ingress]) -> Vec<String> {
    let taken: HashSet<String> = existing.iter().flat_map(accessors::ingress_hosts).collect();

    let mut seen = HashSet::new();
    requested
        .iter()
        .filter(|host| taken.contains(host.as_str()) && seen.insert(host.as_str()))
        .cloned()
        .collect()
}

/// Fails with [`ControllerError::HostnameConflict`] when any requested hostname
/// is in use.
pub async fn ensure_available(
    store: &dyn ResourceStore,
    requested: &[String],
) -> ControllerResult<()> {
    let existing = store.list_all_ingresses().await?;
    let conflicts = find_conflicts(requested, &existing);
    if conflicts.is_empty() {
        Ok(())
    } else {
        warn!("Hostnames already in use: {:?}", conflicts);
        Err(ControllerError::HostnameConflict(conflicts))
    }
}
