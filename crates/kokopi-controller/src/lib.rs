/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Kokopi Controller
//!
//! `kokopi-controller` turns a repository URL into a running, routed tenant on a
//! Kubernetes cluster: a namespace holding a deployment that clones, builds and
//! starts the repository, a service in front of it, and an ingress for its
//! hostnames.
//!
//! The [`orchestrator`] owns the lifecycle transitions, the [`directory`] serves
//! the read side, and both talk to the cluster only through a
//! [`store::ResourceStore`].

pub mod api;
pub mod cli;
pub mod directory;
pub mod error;
pub mod hostnames;
pub mod k8s;
pub mod metrics;
pub mod orchestrator;
pub mod store;
