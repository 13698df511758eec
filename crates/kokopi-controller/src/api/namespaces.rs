/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Tenant-level endpoints: listing, deploying, inspecting and deleting tenants.

use super::{body_error, AppState};
use crate::error::ControllerError;
use axum::extract::rejection::JsonRejection;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kokopi_models::models::{
    DeleteResponse, DeleteStatus, DeployRequest, DeployResponse, TenantOverview, TenantSummary,
};
use kokopi_utils::logging::prelude::*;

pub fn routes() -> Router<AppState> {
    info!("Setting up namespace routes");
    Router::new()
        .route("/namespaces", get(list_namespaces))
        .route("/deploy", post(deploy))
        .route(
            "/namespace/:namespace",
            get(get_namespace).delete(delete_namespace),
        )
        .route("/namespace/:namespace/delete", post(delete_namespace))
        .route("/namespace/:namespace/services", get(list_services))
        .route("/namespace/:namespace/ingresses", get(list_ingresses))
        .route("/namespace/:namespace/deployments", get(list_deployments))
}

async fn list_namespaces(
    State(state): State<AppState>,
) -> Result<Json<Vec<TenantSummary>>, ControllerError> {
    info!("Handling request to list managed namespaces");
    Ok(Json(state.directory.list_tenants().await?))
}

async fn deploy(
    State(state): State<AppState>,
    payload: Result<Json<DeployRequest>, JsonRejection>,
) -> Result<Json<DeployResponse>, ControllerError> {
    let Json(request) = payload.map_err(body_error)?;
    info!(
        "Handling deploy of {} into namespace {}",
        request.repo_url, request.namespace
    );
    Ok(Json(state.orchestrator.deploy(&request).await?))
}

async fn get_namespace(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<TenantOverview>, ControllerError> {
    info!("Handling request for overview of namespace {}", namespace);
    Ok(Json(state.directory.tenant_overview(&namespace).await?))
}

async fn delete_namespace(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<DeleteResponse>, ControllerError> {
    info!("Handling request to delete namespace {}", namespace);
    let outcome = state.orchestrator.delete_tenant(&namespace).await?;

    let message = match outcome.status {
        DeleteStatus::Deleted => format!("Namespace {} deleted successfully", namespace),
        DeleteStatus::Terminating => format!("Namespace {} is terminating", namespace),
        DeleteStatus::Pending => format!("Deletion of namespace {} requested", namespace),
    };

    Ok(Json(DeleteResponse {
        message,
        namespace,
        status: outcome.status,
        polls: outcome.polls,
    }))
}

async fn list_services(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Vec<Service>>, ControllerError> {
    Ok(Json(state.directory.list_endpoints(&namespace).await?))
}

async fn list_ingresses(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Vec<Ingress>>, ControllerError> {
    Ok(Json(state.directory.list_routes(&namespace).await?))
}

async fn list_deployments(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Vec<Deployment>>, ControllerError> {
    Ok(Json(state.directory.list_workloads(&namespace).await?))
}
