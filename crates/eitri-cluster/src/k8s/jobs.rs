/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use super::KubeCluster;
use crate::error::ClusterError;
use crate::metrics;
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use eitri_utils::telemetry::prelude::*;
use k8s_openapi::api::batch::v1::Job;
use kube::api::{Api, DeleteParams, PostParams};
use kube::Error as KubeError;
use std::time::Duration;

/// Creates, fetches and deletes batch/v1 Jobs.
#[async_trait]
pub trait JobLauncher: Send + Sync {
    /// Submits a Job. Errors are returned as the API server reported them; no retry.
    async fn create_job(&self, namespace: &str, job: &Job) -> Result<Job, ClusterError>;

    /// Fetches a Job's current spec and status, `None` if it no longer exists.
    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>, ClusterError>;

    /// Requests deletion of a Job and, in the background, its pods.
    async fn delete_job(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;
}

/// Retry configuration for read-only Kubernetes operations
struct RetryConfig {
    max_elapsed_time: Duration,
    initial_interval: Duration,
    max_interval: Duration,
    multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_elapsed_time: Duration::from_secs(30),
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

/// Determines if a Kubernetes error is worth retrying
pub(crate) fn is_retryable_error(error: &KubeError) -> bool {
    match error {
        KubeError::Api(api_err) => {
            matches!(api_err.code, 429 | 500 | 503 | 504)
                || matches!(
                    api_err.reason.as_str(),
                    "ServiceUnavailable" | "InternalError" | "Timeout"
                )
        }
        _ => false,
    }
}

async fn with_retries<F, Fut, T>(operation: F, config: RetryConfig) -> Result<T, KubeError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, KubeError>>,
{
    let backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(config.initial_interval)
        .with_max_interval(config.max_interval)
        .with_multiplier(config.multiplier)
        .with_max_elapsed_time(Some(config.max_elapsed_time))
        .build();

    backoff::future::retry(backoff, || async {
        operation().await.map_err(|error| {
            if is_retryable_error(&error) {
                warn!("Retryable error encountered: {}", error);
                backoff::Error::transient(error)
            } else {
                backoff::Error::permanent(error)
            }
        })
    })
    .await
}

#[async_trait]
impl JobLauncher for KubeCluster {
    async fn create_job(&self, namespace: &str, job: &Job) -> Result<Job, ClusterError> {
        let jobs: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        metrics::kubernetes_operations_total()
            .with_label_values(&["create_job"])
            .inc();

        let created = jobs.create(&PostParams::default(), job).await?;
        info!(
            "Created job {}/{}",
            namespace,
            created.metadata.name.as_deref().unwrap_or_default()
        );
        Ok(created)
    }

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>, ClusterError> {
        let jobs: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        metrics::kubernetes_operations_total()
            .with_label_values(&["get_job"])
            .inc();

        let job = with_retries(|| jobs.get_opt(name), RetryConfig::default()).await?;
        Ok(job)
    }

    async fn delete_job(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let jobs: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        metrics::kubernetes_operations_total()
            .with_label_values(&["delete_job"])
            .inc();

        match jobs.delete(name, &DeleteParams::background()).await {
            Ok(_) => {
                info!("Requested deletion of job {}/{}", namespace, name);
                Ok(())
            }
            Err(KubeError::Api(response)) if response.code == 404 => {
                debug!("Job {}/{} already gone", namespace, name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
