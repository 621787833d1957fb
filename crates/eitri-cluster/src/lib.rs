/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Eitri Cluster
//!
//! The Kubernetes-facing half of eitri: job submission primitives, the pod watch, the
//! pod lifecycle controller and the per-pod log tailers that fill the on-disk archive.
//!
//! ## Operation Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant K8s
//!     participant Watch
//!     participant Controller
//!     participant Tailer
//!     participant Archive
//!
//!     K8s-->>Watch: pod added/updated/deleted
//!     Watch->>Controller: ControllerEvent (bounded queue)
//!     Controller->>Controller: persist phase (best-effort)
//!     alt pod Running and no tailer yet
//!         Controller->>Tailer: spawn
//!         loop until end of stream
//!             Tailer->>K8s: follow logs
//!             Tailer->>Archive: append line
//!         end
//!         Tailer->>Controller: TailerExited
//!     end
//! ```
//!
//! ## Modules
//!
//! - [`k8s`]: API server client plus the [`k8s::PodLogSource`] and [`k8s::JobLauncher`] seams
//! - [`watch`]: label-selected pod watch producing controller events
//! - [`controller`]: single consumer owning the tracked-pod table
//! - [`tailer`]: follows one pod's log stream into the archive
//! - [`archive`]: `<logs-root>/<job-id>/<pod-name>/logs.log` files
//! - [`metrics`]: Prometheus metrics for the above

pub mod archive;
pub mod controller;
pub mod error;
pub mod k8s;
pub mod metrics;
pub mod tailer;
pub mod watch;

pub use error::{ArchiveError, ClusterError};
