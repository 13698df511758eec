/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Kokopi Config Module
//! This module provides the configuration framework shared by the Kokopi crates.
//!
//! # Variable Naming Convention
//!
//! - Struct fields use snake_case (e.g., `server`, `log_level`)
//! - Environment variables use SCREAMING_SNAKE_CASE and are prefixed with "KOKOPI__"
//!   (e.g., `KOKOPI__SERVER__PORT`)
//! - Configuration file keys use snake_case (e.g., `server.port`, `log.level`)
//!
//! # Configuration Overriding
//!
//! Values are loaded and overridden in the following order (later sources take precedence):
//!
//! 1. Default values from the embedded `default.toml` file
//! 2. Values from an optional external configuration file (if provided)
//! 3. Environment variables
//!
//! # Available Environment Variables
//!
//! - `KOKOPI__LOG__LEVEL`: Log level ("trace", "debug", "info", "warn", "error").
//!   Default: "info"
//! - `KOKOPI__LOG__FORMAT`: "text" or "json". Default: "text"
//! - `KOKOPI__SERVER__HOST` / `KOKOPI__SERVER__PORT`: HTTP bind address.
//!   Default: "0.0.0.0" / 3000
//! - `KOKOPI__KUBERNETES__KUBECONFIG_PATH`: Optional kubeconfig path. When unset the
//!   in-cluster or default kubeconfig is used.
//! - `KOKOPI__RUNTIME__CLONE_IMAGE`: Image of the init container that clones the repository.
//!   Default: "alpine/git:latest"
//! - `KOKOPI__RUNTIME__RUN_IMAGE`: Image running the application. Default: "node:18"
//! - `KOKOPI__RUNTIME__RUN_COMMAND`: Shell command installing, building and starting the app.
//! - `KOKOPI__ROUTING__INGRESS_CLASS`: Ingress class for created routes. Default: "nginx"
//! - `KOKOPI__DELETION__POLL_INTERVAL_MS` / `KOKOPI__DELETION__MAX_ATTEMPTS`: Namespace
//!   termination polling. Default: 1000 / 10
//! - `KOKOPI__AUTH__ADMIN_TOKEN`: Token required on every API request. Unset means open.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

// Include the default settings file as a string constant
const DEFAULT_SETTINGS: &str = include_str!("../default.toml");

/// Represents the main settings structure for the application
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Logging configuration
    pub log: Log,
    /// HTTP server configuration
    pub server: Server,
    /// Kubernetes client configuration
    #[serde(default)]
    pub kubernetes: Kubernetes,
    /// Workload runtime configuration
    pub runtime: Runtime,
    /// Route configuration
    pub routing: Routing,
    /// Tenant deletion polling
    pub deletion: Deletion,
    /// API boundary check
    #[serde(default)]
    pub auth: Auth,
    /// CORS configuration
    pub cors: Cors,
}

/// Represents the logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Log {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,
    /// Log format: "text" for human-readable, "json" for structured JSON
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_format() -> String {
    "text".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

impl Server {
    /// Socket address string suitable for `TcpListener::bind`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Kubernetes {
    /// Kubeconfig path
    pub kubeconfig_path: Option<String>,
}

/// Images and commands encoded into every workload
#[derive(Debug, Deserialize, Clone)]
pub struct Runtime {
    /// Image of the init container that materialises the working copy
    pub clone_image: String,
    /// Image of the container that installs, builds and runs the application
    pub run_image: String,
    /// Shell command executed in the working copy
    pub run_command: String,
    /// Mount point of the working copy
    pub working_dir: String,
    /// Name of the application container
    pub container_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Routing {
    /// Ingress class assigned to created routes
    pub ingress_class: String,
    /// Container port used when a deployment declares none
    pub default_container_port: i32,
    /// Path prefix used when a host config declares none
    pub default_path: String,
}

/// Bounded polling of namespace termination
#[derive(Debug, Deserialize, Clone)]
pub struct Deletion {
    pub poll_interval_ms: u64,
    pub max_attempts: u32,
}

impl Deletion {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Auth {
    /// Token expected in the Authorization header
    pub admin_token: Option<String>,
}

/// Represents the CORS configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Cors {
    /// Allowed origins for CORS requests
    /// Use "*" to allow all origins (not recommended for production)
    pub allowed_origins: Vec<String>,
    /// Max age for preflight cache in seconds
    pub max_age_seconds: u64,
}

impl Settings {
    /// Creates a new `Settings` instance
    ///
    /// # Arguments
    ///
    /// * `file` - An optional path to a configuration file
    ///
    /// # Returns
    ///
    /// Returns a `Result` containing the `Settings` instance or a `ConfigError`
    pub fn new(file: Option<String>) -> Result<Self, ConfigError> {
        // Start with default settings from the embedded TOML file
        let mut s = Config::builder()
            .add_source(File::from_str(DEFAULT_SETTINGS, config::FileFormat::Toml));

        // If a configuration file is provided, add it as a source
        s = match file {
            Some(x) => s.add_source(File::with_name(x.as_str())),
            None => s,
        };

        // Add environment variables as a source, prefixed with "KOKOPI" and using "__" as a separator
        s = s.add_source(Environment::with_prefix("KOKOPI").separator("__"));

        s.build()?.try_deserialize()
    }
}
