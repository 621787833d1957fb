/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use crate::api::v1::jobs::JobStatusResponse;
use crate::api::v1::{jobs, logs};
use crate::api::AppState;
use crate::submitter::{JobTemplate, SubmittedJob};
use axum::{response::Json, routing::get, Router};
use eitri_models::models::Job;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        jobs::create_job,
        jobs::list_jobs,
        jobs::get_job,
        jobs::get_job_status,
        jobs::delete_job,
        logs::get_job_logs,
    ),
    components(schemas(Job, JobTemplate, SubmittedJob, JobStatusResponse)),
    tags(
        (name = "jobs", description = "Job submission and lifecycle API"),
        (name = "logs", description = "Archived job logs API")
    )
)]
pub struct ApiDoc;

pub fn configure_openapi() -> Router<AppState> {
    Router::new().route("/openapi.json", get(serve_openapi))
}

async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
