/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Boundary check for the `/api` routes.
//!
//! When an admin token is configured every request must present it in the
//! `Authorization` header, either bare or as `Bearer <token>`. Without a
//! configured token the API is open.

use super::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use kokopi_utils::logging::prelude::*;

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

/// Rejects requests that do not carry the configured admin token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.admin_token.as_deref() else {
        return next.run(request).await;
    };

    let presented = match request
        .headers()
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
    {
        Some(value) => value.strip_prefix("Bearer ").unwrap_or(value).trim(),
        None => {
            warn!("Authorization header missing or invalid");
            return unauthorized("Authorization header required");
        }
    };

    if presented != expected {
        warn!("Rejected request with invalid token");
        return unauthorized("Invalid token");
    }

    next.run(request).await
}
