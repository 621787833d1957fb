/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Job Submitter
//!
//! Turns a caller-supplied template into a cluster Job:
//!
//! 1. Resolve the application's secrets. A decryption failure aborts before any cluster call.
//! 2. Replace every `{{secrets.<name>}}` in the template's string values. Unknown names become `""`.
//! 3. Name the Job `<template-name>-<10 random lowercase letters>`.
//! 4. Merge the marker and correlation labels into the Job's and the pod template's labels.
//! 5. Create the Job, then record it as `Pending` under the pre-generated identifier.
//!
//! The stored spec is the template as submitted, placeholders intact, so plaintext
//! secret values only ever exist in the cluster object.

use crate::metrics;
use crate::secrets::{SecretError, SecretResolver};
use crate::store::{JobStore, StoreError};
use eitri_cluster::k8s::JobLauncher;
use eitri_cluster::ClusterError;
use eitri_models::models::jobs::MAX_JOB_NAME_LENGTH;
use eitri_models::models::{Job, NewJob};
use eitri_utils::telemetry::prelude::*;
use k8s_openapi::api::batch::v1::{Job as ClusterJob, JobSpec, JobStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use rand::Rng;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, LazyLock};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Length of the random suffix appended to the template name.
pub const NAME_SUFFIX_LENGTH: usize = 10;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*secrets\.([A-Za-z0-9_.\-]+)\s*\}\}")
        .expect("constant regex pattern is valid")
});

/// Request body for a job submission.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct JobTemplate {
    /// Object metadata; `name` is required and becomes the Job name prefix
    #[schema(value_type = Object)]
    pub metadata: ObjectMeta,
    /// batch/v1 JobSpec, possibly containing `{{secrets.<name>}}` placeholders
    #[schema(value_type = Object)]
    pub spec: Value,
}

/// Response body for a successful submission.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubmittedJob {
    pub job: Job,
    /// Spec as returned by the cluster
    #[schema(value_type = Object)]
    pub spec: Option<JobSpec>,
    /// Status as returned by the cluster
    #[schema(value_type = Object)]
    pub status: Option<JobStatus>,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Secrets(#[from] SecretError),

    #[error("invalid job template: {0}")]
    InvalidTemplate(String),

    #[error("{}", .0.server_message())]
    Cluster(#[source] ClusterError),

    #[error("failed to record job: {0}")]
    Store(#[from] StoreError),
}

impl SubmitError {
    fn as_label(&self) -> &'static str {
        match self {
            SubmitError::Secrets(_) => "secrets_error",
            SubmitError::InvalidTemplate(_) => "invalid",
            SubmitError::Cluster(_) => "cluster_error",
            SubmitError::Store(_) => "store_error",
        }
    }
}

/// Labels written to submitted Jobs and their pods.
#[derive(Debug, Clone)]
pub struct SubmitterLabels {
    pub marker_label: String,
    pub marker_value: String,
    pub correlation_label: String,
}

pub struct JobSubmitter {
    secrets: SecretResolver,
    jobs: Arc<dyn JobStore>,
    launcher: Arc<dyn JobLauncher>,
    labels: SubmitterLabels,
    default_namespace: String,
}

/// Replaces every secret placeholder in `input`.
pub fn interpolate_str<'a>(input: &'a str, secrets: &HashMap<String, String>) -> Cow<'a, str> {
    PLACEHOLDER.replace_all(input, |caps: &Captures| {
        secrets.get(&caps[1]).cloned().unwrap_or_default()
    })
}

/// Replaces secret placeholders in every string value of a JSON tree, in place.
///
/// Object keys are left alone. Because substitution happens on decoded strings, a
/// secret value containing quotes or backslashes cannot break the document.
pub fn interpolate_secrets(value: &mut Value, secrets: &HashMap<String, String>) {
    match value {
        Value::String(text) => {
            if let Cow::Owned(replaced) = interpolate_str(text, secrets) {
                *text = replaced;
            }
        }
        Value::Array(items) => items
            .iter_mut()
            .for_each(|item| interpolate_secrets(item, secrets)),
        Value::Object(map) => map
            .values_mut()
            .for_each(|item| interpolate_secrets(item, secrets)),
        _ => {}
    }
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..NAME_SUFFIX_LENGTH)
        .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
        .collect()
}

fn merge_labels(target: &mut Option<BTreeMap<String, String>>, labels: &BTreeMap<String, String>) {
    target
        .get_or_insert_with(BTreeMap::new)
        .extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
}

impl JobSubmitter {
    pub fn new(
        secrets: SecretResolver,
        jobs: Arc<dyn JobStore>,
        launcher: Arc<dyn JobLauncher>,
        labels: SubmitterLabels,
        default_namespace: String,
    ) -> Self {
        Self {
            secrets,
            jobs,
            launcher,
            labels,
            default_namespace,
        }
    }

    fn job_labels(&self, job_id: Uuid) -> BTreeMap<String, String> {
        BTreeMap::from([
            (self.labels.marker_label.clone(), self.labels.marker_value.clone()),
            (self.labels.correlation_label.clone(), job_id.to_string()),
        ])
    }

    /// Submits a Job for `application_id` and records it.
    pub async fn submit(
        &self,
        application_id: Uuid,
        template: JobTemplate,
    ) -> Result<SubmittedJob, SubmitError> {
        let result = self.try_submit(application_id, template).await;
        let status = match &result {
            Ok(_) => "created",
            Err(e) => e.as_label(),
        };
        metrics::jobs_submitted_total()
            .with_label_values(&[status])
            .inc();
        result
    }

    async fn try_submit(
        &self,
        application_id: Uuid,
        template: JobTemplate,
    ) -> Result<SubmittedJob, SubmitError> {
        let base_name = template
            .metadata
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| SubmitError::InvalidTemplate("metadata.name is required".to_string()))?;
        let name = format!("{}-{}", base_name, random_suffix());
        if name.len() > MAX_JOB_NAME_LENGTH {
            return Err(SubmitError::InvalidTemplate(format!(
                "metadata.name must leave room for the {}-character suffix",
                NAME_SUFFIX_LENGTH + 1
            )));
        }
        let namespace = template
            .metadata
            .namespace
            .clone()
            .filter(|ns| !ns.trim().is_empty())
            .unwrap_or_else(|| self.default_namespace.clone());

        let secrets = self.secrets.resolve(application_id)?;
        let mut spec_value = template.spec.clone();
        interpolate_secrets(&mut spec_value, &secrets);
        let mut spec: JobSpec = serde_json::from_value(spec_value)
            .map_err(|e| SubmitError::InvalidTemplate(format!("invalid job spec: {}", e)))?;

        let job_id = Uuid::new_v4();
        let labels = self.job_labels(job_id);

        let mut metadata = template.metadata;
        metadata.name = Some(name.clone());
        metadata.namespace = Some(namespace.clone());
        merge_labels(&mut metadata.labels, &labels);
        merge_labels(
            &mut spec.template.metadata.get_or_insert_with(Default::default).labels,
            &labels,
        );

        let job = ClusterJob {
            metadata,
            spec: Some(spec),
            status: None,
        };

        info!(
            application_id = %application_id,
            job_id = %job_id,
            "Submitting job {}/{}",
            namespace,
            name
        );
        let created = self
            .launcher
            .create_job(&namespace, &job)
            .await
            .map_err(|e| {
                warn!(job_id = %job_id, "Cluster rejected job {}: {}", name, e);
                SubmitError::Cluster(e)
            })?;

        let meta = serde_json::to_value(&created.metadata).unwrap_or(Value::Null);
        let new_job = NewJob::new(job_id, application_id, name, namespace, template.spec, meta)
            .map_err(SubmitError::InvalidTemplate)?;

        let record = match self.jobs.create(&new_job) {
            Ok(record) => record,
            Err(e) => {
                error!(job_id = %job_id, "Failed to record job {}: {}", new_job.name, e);
                // Nothing would ever track the Job without its record
                if let Err(delete_err) = self
                    .launcher
                    .delete_job(&new_job.namespace, &new_job.name)
                    .await
                {
                    error!(
                        job_id = %job_id,
                        "Failed to remove unrecorded job {}: {}", new_job.name, delete_err
                    );
                }
                return Err(e.into());
            }
        };

        Ok(SubmittedJob {
            job: record,
            spec: created.spec,
            status: created.status,
        })
    }
}
