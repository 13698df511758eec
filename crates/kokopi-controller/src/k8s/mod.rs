/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Kubernetes Objects
//!
//! Typed construction of the four resource kinds a tenant is made of, and total
//! accessors for reading them back.
//!
//! ## Object graph
//!
//! ```text
//! Namespace <tenant>                 kokopi.io/managed=true
//! ├── Deployment <slug>-<millis>     app=<slug>-<millis>
//! │   ├── init container git-clone   clone or pull into the shared volume
//! │   └── container app              install, build, start
//! ├── Service <slug>-<millis>        selector app=<slug>-<millis>
//! └── Ingress <slug>-<millis>        one rule per hostname
//! ```

pub mod accessors;
pub mod objects;
