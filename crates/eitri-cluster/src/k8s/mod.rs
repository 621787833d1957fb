/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Kubernetes Module
//!
//! Everything in eitri that talks to the API server goes through [`KubeCluster`].
//! The core consumes it through two narrow traits so that workers can be driven by
//! fakes in tests:
//!
//! - [`PodLogSource`]: follow a named pod's log output
//! - [`JobLauncher`]: create, fetch and delete batch/v1 Jobs
//!
//! ```rust,ignore
//! let client = create_k8s_client(settings.cluster.kubeconfig_path.as_deref()).await?;
//! let cluster = KubeCluster::new(client);
//! let lines = cluster.follow("default", "report-abc-x7k2p", Some(60)).await?;
//! ```

mod jobs;
mod logs;

pub use jobs::JobLauncher;
pub use logs::{decode_lines, LogLineStream, PodLogSource};

use crate::error::ClusterError;
use eitri_utils::telemetry::prelude::*;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;

/// Kubernetes-backed implementation of the cluster traits.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Creates a Kubernetes client and verifies the API server answers.
///
/// # Arguments
/// * `kubeconfig_path` - Explicit kubeconfig; in-cluster or default discovery is used when `None`
///
/// # Returns
/// * `Result<Client, ClusterError>` - A connected client
pub async fn create_k8s_client(kubeconfig_path: Option<&str>) -> Result<Client, ClusterError> {
    let config = match kubeconfig_path {
        Some(path) => {
            info!("Loading kubeconfig from {}", path);
            let kubeconfig = Kubeconfig::read_from(path)?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?
        }
        None => kube::Config::infer().await?,
    };

    let client = Client::try_from(config)?;

    let version = client.apiserver_version().await?;
    info!(
        "Connected to Kubernetes API server {}.{} ({})",
        version.major, version.minor, version.git_version
    );

    Ok(client)
}
