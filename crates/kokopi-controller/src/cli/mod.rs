/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

/// Command-line interface of the kokopi controller.
pub mod commands;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
/// Kokopi controller CLI
///
/// Serves the deployment API, or renders the manifests a deploy would create.
pub struct Cli {
    /// Configuration file layered over the built-in defaults
    #[arg(long, global = true, env = "KOKOPI_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API against the configured cluster
    Serve,

    /// Print the namespace, deployment, service and ingress for a repository
    Render(RenderArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// Repository to clone and run
    #[arg(long)]
    pub repo_url: String,

    /// Tenant namespace
    #[arg(long)]
    pub namespace: String,

    /// Hostname routed to the first container port
    #[arg(long)]
    pub host: String,

    /// Container ports, repeatable
    #[arg(long = "port")]
    pub ports: Vec<i32>,

    /// File of KEY=VALUE lines
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    #[arg(long, default_value_t = 1)]
    pub replicas: i32,
}

/// Parses command-line arguments into the Cli structure.
pub fn parse_cli() -> Cli {
    Cli::parse()
}
