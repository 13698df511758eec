/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # API Routes Aggregator Module
//!
//! Assembles the `/api` routes the panel drives, the probes, and the metrics
//! endpoint into one router.
//!
//! Every `/api` failure is answered as `{"error": "<message>"}` with the status
//! chosen by [`ControllerError::status_code`].

mod deployments;
mod middleware;
mod namespaces;
mod pods;

use crate::directory::TenantDirectory;
use crate::error::ControllerError;
use crate::metrics;
use crate::orchestrator::Orchestrator;
use crate::store::ResourceStore;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderValue, Method, Request, StatusCode};
use axum::middleware::{from_fn, from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use kokopi_utils::config::{Cors, Settings};
use kokopi_utils::logging::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub directory: TenantDirectory,
    pub store: Arc<dyn ResourceStore>,
    /// Token required on `/api` requests, when configured
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(store: Arc<dyn ResourceStore>, settings: &Settings) -> Self {
        Self {
            orchestrator: Arc::new(Orchestrator::from_settings(store.clone(), settings)),
            directory: TenantDirectory::new(store.clone()),
            store,
            admin_token: settings
                .auth
                .admin_token
                .as_deref()
                .filter(|token| !token.is_empty())
                .map(Arc::from),
        }
    }
}

impl IntoResponse for ControllerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            debug!("Request rejected: {}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Maps a malformed JSON body onto the API's error shape.
pub(crate) fn body_error(rejection: JsonRejection) -> ControllerError {
    ControllerError::invalid("body", rejection.body_text())
}

/// Configures the full application router.
pub fn configure_api_routes(state: AppState, cors: &Cors) -> Router<AppState> {
    Router::new()
        .nest("/api", api_routes(state))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .layer(build_cors_layer(cors))
        .layer(from_fn(track_requests))
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(namespaces::routes())
        .merge(deployments::routes())
        .merge(pods::routes())
        .layer(from_fn_with_state(state, middleware::auth_middleware))
}

fn build_cors_layer(cors: &Cors) -> CorsLayer {
    let origins = if cors.allowed_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            cors.allowed_origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .max_age(Duration::from_secs(cors.max_age_seconds))
}

async fn track_requests(request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::HTTP_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), response.status().as_str()])
        .inc();
    response
}

/// Liveness: the process is serving requests.
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness: the resource store answers.
async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "Ready"),
        Err(e) => {
            warn!("Readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "Not Ready")
        }
    }
}

async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        metrics::encode_metrics(),
    )
}
