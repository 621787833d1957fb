/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use thiserror::Error;

/// Failures talking to the Kubernetes API or reading a pod's log stream.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("{0}")]
    Kube(#[from] kube::Error),

    #[error("failed to load kubeconfig: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("failed to infer cluster configuration: {0}")]
    InferConfig(#[from] kube::config::InferConfigError),

    #[error("log stream read failed: {0}")]
    Stream(#[from] std::io::Error),

    #[error("invalid resource: {0}")]
    Invalid(String),
}

impl ClusterError {
    /// The message the API server returned, or the rendered error otherwise.
    pub fn server_message(&self) -> String {
        match self {
            ClusterError::Kube(kube::Error::Api(response)) => response.message.clone(),
            other => other.to_string(),
        }
    }

    /// HTTP status reported by the API server, if the failure came from one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClusterError::Kube(kube::Error::Api(response)) => Some(response.code),
            _ => None,
        }
    }
}

/// Failures reading or writing the on-disk log archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pod name for archive path: {0:?}")]
    InvalidPodName(String),
}
