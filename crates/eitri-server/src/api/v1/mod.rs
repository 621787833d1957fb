/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

mod jobs;
mod logs;
pub mod openapi;

use crate::api::AppState;
use axum::Router;

pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(jobs::routes())
        .merge(logs::routes())
        .merge(openapi::configure_openapi())
}
