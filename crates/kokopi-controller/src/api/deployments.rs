/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Workload endpoints: detail, environment patch, restart and redeploy.

use super::{body_error, AppState};
use crate::error::ControllerError;
use crate::k8s::accessors;
use crate::k8s::objects::RESTARTED_AT_ANNOTATION;
use crate::orchestrator::DeploymentDetail;
use axum::extract::rejection::JsonRejection;
use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use kokopi_models::models::{env, PatchEnvRequest, RedeployRequest};
use kokopi_utils::logging::prelude::*;
use serde_json::{json, Value};

pub fn routes() -> Router<AppState> {
    info!("Setting up deployment routes");
    Router::new()
        .route("/namespace/:namespace/deployment/:name", get(get_deployment))
        .route(
            "/namespace/:namespace/deployment/:name/env",
            patch(patch_env),
        )
        .route(
            "/namespace/:namespace/deployment/:name/restart",
            post(restart),
        )
        .route(
            "/namespace/:namespace/deployment/:name/redeploy",
            post(redeploy),
        )
}

async fn get_deployment(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<DeploymentDetail>, ControllerError> {
    info!("Handling request for deployment {}/{}", namespace, name);
    Ok(Json(
        state
            .orchestrator
            .deployment_detail(&namespace, &name)
            .await?,
    ))
}

async fn patch_env(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    payload: Result<Json<PatchEnvRequest>, JsonRejection>,
) -> Result<Json<Value>, ControllerError> {
    let Json(request) = payload.map_err(body_error)?;
    info!("Handling environment update of {}/{}", namespace, name);

    let updated = state
        .orchestrator
        .patch_env(&namespace, &name, &request.env_vars)
        .await?;
    let entries =
        accessors::container_env(&updated, &state.orchestrator.runtime().container_name);

    Ok(Json(json!({
        "message": format!("Environment of deployment {} updated", name),
        "envVars": entries,
        "envText": env::encode(&entries),
    })))
}

async fn restart(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<Value>, ControllerError> {
    info!("Handling restart of {}/{}", namespace, name);
    let updated = state.orchestrator.restart(&namespace, &name).await?;
    let restarted_at = accessors::template_annotations(&updated)
        .remove(RESTARTED_AT_ANNOTATION)
        .unwrap_or_default();

    Ok(Json(json!({
        "message": format!("Deployment {} restarted", name),
        "restartedAt": restarted_at,
    })))
}

async fn redeploy(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    payload: Result<Json<RedeployRequest>, JsonRejection>,
) -> Result<Json<Value>, ControllerError> {
    let Json(request) = payload.map_err(body_error)?;
    info!(
        "Handling redeploy of {}/{} from {}",
        namespace, name, request.repo_url
    );
    state
        .orchestrator
        .redeploy(&namespace, &name, &request.repo_url)
        .await?;

    Ok(Json(json!({
        "message": format!("Deployment {} redeployed from {}", name, request.repo_url.trim()),
    })))
}
