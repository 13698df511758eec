/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use super::AppState;
use crate::error::ControllerError;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use k8s_openapi::api::core::v1::Pod;
use kokopi_utils::logging::prelude::*;
use serde::Deserialize;

pub fn routes() -> Router<AppState> {
    info!("Setting up pod routes");
    Router::new()
        .route("/namespace/:namespace/pods", get(list_pods))
        .route("/namespace/:namespace/pod/:pod", get(get_pod))
        .route("/namespace/:namespace/pod/:pod/log", get(pod_log))
}

#[derive(Debug, Default, Deserialize)]
struct LogQuery {
    container: Option<String>,
}

async fn list_pods(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Vec<Pod>>, ControllerError> {
    Ok(Json(state.directory.list_pods(&namespace).await?))
}

async fn get_pod(
    State(state): State<AppState>,
    Path((namespace, pod)): Path<(String, String)>,
) -> Result<Json<Pod>, ControllerError> {
    Ok(Json(state.directory.get_pod(&namespace, &pod).await?))
}

async fn pod_log(
    State(state): State<AppState>,
    Path((namespace, pod)): Path<(String, String)>,
    Query(query): Query<LogQuery>,
) -> Result<Json<serde_json::Value>, ControllerError> {
    debug!("Fetching logs of pod {}/{}", namespace, pod);
    let log = state
        .directory
        .pod_logs(&namespace, &pod, query.container.as_deref())
        .await?;
    Ok(Json(serde_json::json!({ "log": log })))
}
