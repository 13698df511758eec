/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use super::RenderArgs;
use crate::api::{self, AppState};
use crate::k8s::accessors;
use crate::k8s::objects::{build_endpoint, build_route, build_tenant, build_workload, RuntimeProfile};
use crate::orchestrator::{normalise, RoutingDefaults};
use crate::store::{create_k8s_client, KubeStore, ResourceStore};
use chrono::Utc;
use kokopi_models::models::{DeployRequest, PortConfig};
use kokopi_utils::config::Settings;
use kokopi_utils::logging::prelude::*;
use std::sync::Arc;
use tokio::signal;

/// Starts the HTTP API with graceful shutdown on ctrl+c.
pub async fn serve(config: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting Kokopi controller");

    info!("Creating Kubernetes client");
    let client = create_k8s_client(config.kubernetes.kubeconfig_path.as_deref()).await?;
    let store: Arc<dyn ResourceStore> = Arc::new(KubeStore::new(client));
    match store.ping().await {
        Ok(()) => info!("Kubernetes API server reachable"),
        Err(e) => warn!("Kubernetes API server not reachable yet: {}", e),
    }

    info!("Configuring API routes");
    let state = AppState::new(store, config);
    let app = api::configure_api_routes(state.clone(), &config.cors).with_state(state);

    let addr = config.server.bind_address();
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!("Failed to listen for ctrl+c: {}", e),
        }
        shutdown_tx.send(()).ok();
    });

    info!("Kokopi controller is now running");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
        })
        .await?;

    info!("Kokopi controller stopped");
    Ok(())
}

/// Renders the four manifests of a deploy as a multi-document YAML stream.
///
/// Validation is the same as the API's; nothing is sent to the cluster.
pub fn render(config: &Settings, args: &RenderArgs) -> Result<String, Box<dyn std::error::Error>> {
    let env_vars = match &args.env_file {
        Some(path) => Some(std::fs::read_to_string(path)?),
        None => None,
    };

    let request = DeployRequest {
        namespace: args.namespace.clone(),
        repo_url: args.repo_url.clone(),
        env_vars,
        host: Some(args.host.clone()),
        ports: Some(
            args.ports
                .iter()
                .map(|&container_port| PortConfig { container_port })
                .collect(),
        ),
        hosts: None,
        replicas: Some(args.replicas),
        user: None,
    };

    let routing = RoutingDefaults::from(&config.routing);
    let runtime = RuntimeProfile::from(&config.runtime);
    let plan = normalise(&request, &routing)?;
    let created_at = Utc::now();

    let workload = build_workload(
        &plan.repo_url,
        &plan.env,
        &plan.ports,
        plan.replicas,
        &plan.tenant_id,
        &runtime,
        created_at,
    )?;
    let name = accessors::name(&workload.metadata);

    let documents = [
        serde_yaml::to_string(&build_tenant(
            &plan.tenant_id,
            &plan.repo_url,
            &plan.user,
            created_at,
        ))?,
        serde_yaml::to_string(&workload)?,
        serde_yaml::to_string(&build_endpoint(&name, &plan.ports, &plan.tenant_id))?,
        serde_yaml::to_string(&build_route(
            &name,
            &plan.routes,
            &plan.tenant_id,
            &routing.ingress_class,
        ))?,
    ];

    debug!("Rendered manifests for workload {}", name);
    Ok(documents.join("---\n"))
}
