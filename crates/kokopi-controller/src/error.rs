/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Error types for the controller.

use crate::store::StoreError;
use axum::http::StatusCode;

/// Result type alias using [`ControllerError`].
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Errors surfaced by the orchestrator and the tenant directory.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Malformed or missing request field, rejected before any store call.
    #[error("invalid {field}: {reason}")]
    InvalidInput {
        /// Name of the offending request field.
        field: &'static str,
        reason: String,
    },

    /// Requested hostnames are already routed by an existing ingress.
    #[error("hostname already in use: {}", .0.join(", "))]
    HostnameConflict(Vec<String>),

    /// The tenant namespace does not exist.
    #[error("namespace {0} not found")]
    TenantNotFound(String),

    /// A resource inside an existing tenant does not exist.
    #[error("{kind} {name} not found")]
    ResourceNotFound { kind: &'static str, name: String },

    /// The store rejected a write, typically a stale resource version.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other failure reported by the resource store.
    #[error("{0}")]
    Store(String),
}

impl ControllerError {
    #[must_use]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    /// HTTP status the API layer answers with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Self::HostnameConflict(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::TenantNotFound(_) | Self::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short machine-readable label, used for metrics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::HostnameConflict(_) => "hostname_conflict",
            Self::TenantNotFound(_) => "tenant_not_found",
            Self::ResourceNotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Store(_) => "store_failure",
        }
    }
}

impl From<StoreError> for ControllerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, name } => Self::ResourceNotFound { kind, name },
            StoreError::Conflict(message) => Self::Conflict(message),
            StoreError::Api(message) => Self::Store(message),
        }
    }
}
