/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Eitri Server
//!
//! `eitri-server` is the process side of Eitri: it accepts job submissions, resolves
//! application secrets into them, serves archived logs, and relays live pod logs to
//! browser viewers over WebSockets.
//!
//! ```mermaid
//! flowchart LR
//!     API[REST API] --> SUB[JobSubmitter]
//!     SUB --> SEC[SecretResolver]
//!     SUB --> K8S[(cluster)]
//!     WS[/ws] --> LIVE[LiveBridge]
//!     LIVE --> K8S
//!     LIVE --> HUB((Hub))
//!     HUB --> WS
//! ```
//!
//! The cluster-facing controller, tailers and archive live in `eitri-cluster`.

pub mod api;
pub mod cli;
pub mod dal;
pub mod db;
pub mod hub;
pub mod live;
pub mod metrics;
pub mod secrets;
pub mod store;
pub mod submitter;
pub mod utils;
