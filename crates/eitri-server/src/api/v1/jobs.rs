/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Jobs API endpoints.
//!
//! Submission, lookup, cluster status and deletion of job records.

use crate::api::AppState;
use crate::submitter::{JobTemplate, SubmitError, SubmittedJob};
use axum::http::StatusCode;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use eitri_models::models::Job;
use eitri_utils::telemetry::prelude::*;
use k8s_openapi::api::batch::v1::{JobSpec, JobStatus};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({"error": message.into()})))
}

/// Creates and returns the router for job endpoints.
pub fn routes() -> Router<AppState> {
    info!("Setting up job routes");
    Router::new()
        .route(
            "/applications/:application_id/jobs",
            get(list_jobs).post(create_job),
        )
        .route("/jobs/:id", get(get_job).delete(delete_job))
        .route("/jobs/:id/status", get(get_job_status))
}

/// Cluster-side view of a job.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobStatusResponse {
    pub job: Job,
    #[schema(value_type = Object)]
    pub spec: Option<JobSpec>,
    #[schema(value_type = Object)]
    pub status: Option<JobStatus>,
}

fn find_job(state: &AppState, id: Uuid) -> Result<Job, ApiError> {
    match state.jobs.get(id) {
        Ok(Some(job)) => Ok(job),
        Ok(None) => {
            warn!("Job not found with ID: {}", id);
            Err(api_error(StatusCode::NOT_FOUND, "Job not found"))
        }
        Err(e) => {
            error!("Failed to fetch job with ID {}: {}", id, e);
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch job",
            ))
        }
    }
}

/// Submits a job for an application.
///
/// `{{secrets.<name>}}` placeholders in the Job template are replaced with the application's
/// secrets before the Job reaches the cluster.
#[utoipa::path(
    post,
    path = "/api/v1/applications/{application_id}/jobs",
    tag = "jobs",
    params(("application_id" = Uuid, Path, description = "Owning application")),
    request_body = JobTemplate,
    responses(
        (status = 201, description = "Job created", body = SubmittedJob),
        (status = 400, description = "Invalid job template"),
        (status = 500, description = "Secrets unreadable or job not recorded"),
        (status = 502, description = "The cluster rejected the job"),
    )
)]
async fn create_job(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    Json(template): Json<JobTemplate>,
) -> Result<(StatusCode, Json<SubmittedJob>), ApiError> {
    info!(
        "Handling request to submit job for application {}",
        application_id
    );

    match state.submitter.submit(application_id, template).await {
        Ok(submitted) => {
            info!(
                job_id = %submitted.job.id,
                "Successfully submitted job {}",
                submitted.job.name
            );
            Ok((StatusCode::CREATED, Json(submitted)))
        }
        Err(SubmitError::InvalidTemplate(message)) => {
            warn!("Rejected job template: {}", message);
            Err(api_error(StatusCode::BAD_REQUEST, message))
        }
        Err(SubmitError::Cluster(e)) => {
            error!("Cluster rejected job for application {}: {}", application_id, e);
            Err(api_error(StatusCode::BAD_GATEWAY, e.server_message()))
        }
        Err(e) => {
            error!("Failed to submit job for application {}: {}", application_id, e);
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to submit job",
            ))
        }
    }
}

/// Lists an application's jobs, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/applications/{application_id}/jobs",
    tag = "jobs",
    params(("application_id" = Uuid, Path, description = "Owning application")),
    responses(
        (status = 200, description = "Jobs of the application", body = Vec<Job>),
        (status = 500, description = "Internal server error"),
    )
)]
async fn list_jobs(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
) -> Result<Json<Vec<Job>>, ApiError> {
    info!("Handling request to list jobs for application {}", application_id);

    match state.jobs.list_for_application(application_id) {
        Ok(jobs) => {
            info!("Successfully retrieved {} jobs", jobs.len());
            Ok(Json(jobs))
        }
        Err(e) => {
            error!("Failed to list jobs for application {}: {}", application_id, e);
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to list jobs",
            ))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    tag = "jobs",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job record", body = Job),
        (status = 404, description = "Job not found"),
        (status = 500, description = "Internal server error"),
    )
)]
async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, ApiError> {
    info!("Handling request to get job with ID: {}", id);
    find_job(&state, id).map(Json)
}

/// Fetches the cluster's current spec and status for a job.
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}/status",
    tag = "jobs",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Cluster view of the job", body = JobStatusResponse),
        (status = 404, description = "Job not found"),
        (status = 502, description = "The cluster could not be queried"),
    )
)]
async fn get_job_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    info!("Handling request to get cluster status of job {}", id);
    let job = find_job(&state, id)?;

    match state.launcher.get_job(&job.namespace, &job.name).await {
        Ok(Some(cluster_job)) => Ok(Json(JobStatusResponse {
            job,
            spec: cluster_job.spec,
            status: cluster_job.status,
        })),
        Ok(None) => {
            warn!("Cluster job {}/{} no longer exists", job.namespace, job.name);
            Err(api_error(StatusCode::NOT_FOUND, "Cluster job not found"))
        }
        Err(e) => {
            error!("Failed to fetch cluster job {}/{}: {}", job.namespace, job.name, e);
            Err(api_error(StatusCode::BAD_GATEWAY, e.server_message()))
        }
    }
}

/// Deletes a job record and requests removal of its cluster Job.
///
/// The archive stays on disk. Cluster-side failures are logged only.
#[utoipa::path(
    delete,
    path = "/api/v1/jobs/{id}",
    tag = "jobs",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 204, description = "Job deleted"),
        (status = 404, description = "Job not found"),
        (status = 500, description = "Internal server error"),
    )
)]
async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    info!("Handling request to delete job with ID: {}", id);
    let job = find_job(&state, id)?;

    if let Err(e) = state.jobs.delete(id) {
        error!("Failed to delete job with ID {}: {}", id, e);
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to delete job",
        ));
    }

    let launcher = state.launcher.clone();
    tokio::spawn(async move {
        if let Err(e) = launcher.delete_job(&job.namespace, &job.name).await {
            error!(
                job_id = %job.id,
                "Failed to delete cluster job {}/{}: {}", job.namespace, job.name, e
            );
        }
    });

    info!("Successfully deleted job with ID: {}", id);
    Ok(StatusCode::NO_CONTENT)
}
