/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Historical log retrieval from the on-disk archive.

use crate::api::AppState;
use axum::http::StatusCode;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use eitri_cluster::archive::ArchivedFile;
use eitri_utils::telemetry::prelude::*;
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    info!("Setting up log routes");
    Router::new().route("/jobs/:id/logs", get(get_job_logs))
}

/// Returns every archived pod log of a job, oldest first.
///
/// Jobs without an archive, including unknown ones, yield an empty list.
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}/logs",
    tag = "logs",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Archived pod logs sorted by creation time"),
        (status = 500, description = "The archive could not be read"),
    )
)]
async fn get_job_logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ArchivedFile>>, (StatusCode, Json<serde_json::Value>)> {
    info!("Handling request to read archived logs of job {}", id);

    match state.archive.read_job(id).await {
        Ok(files) => {
            debug!("Read {} archived log files for job {}", files.len(), id);
            Ok(Json(files))
        }
        Err(e) => {
            error!("Failed to read archived logs of job {}: {}", id, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Failed to read archived logs"})),
            ))
        }
    }
}
