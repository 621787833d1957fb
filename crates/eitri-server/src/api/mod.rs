/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # API Routes Aggregator Module
//!
//! Builds the application router: the versioned REST API under `/api/v1`, the live
//! viewer WebSocket at `/ws`, and the health and metrics endpoints.

pub mod v1;

use crate::live::{self, LiveBridge};
use crate::metrics;
use crate::store::JobStore;
use crate::submitter::JobSubmitter;
use axum::extract::FromRef;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::{response::IntoResponse, routing::get, Router};
use eitri_cluster::archive::LogArchive;
use eitri_cluster::k8s::JobLauncher;
use eitri_utils::config::Cors;
use eitri_utils::telemetry::prelude::*;
use hyper::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Everything the handlers need, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobStore>,
    pub submitter: Arc<JobSubmitter>,
    pub launcher: Arc<dyn JobLauncher>,
    pub archive: LogArchive,
    pub live: LiveBridge,
}

impl FromRef<AppState> for LiveBridge {
    fn from_ref(state: &AppState) -> Self {
        state.live.clone()
    }
}

/// Configures and returns the main application router with all API routes
///
/// # Arguments
///
/// * `cors` - Cross-origin policy applied to every route
///
/// # Returns
///
/// A `Router` that still needs its `AppState`.
pub fn configure_api_routes(cors: &Cors) -> Router<AppState> {
    Router::new()
        .nest("/api/v1", v1::routes())
        .route("/ws", get(live::ws_handler))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .layer(cors_layer(cors))
        .layer(TraceLayer::new_for_http())
}

/// Builds the CORS layer from configuration. A `*` entry allows anything.
pub fn cors_layer(config: &Cors) -> CorsLayer {
    let origins = if config.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!("Ignoring invalid CORS origin {:?}", origin);
                        None
                    }
                }),
        )
    };

    let methods: Vec<Method> = config
        .allowed_methods
        .iter()
        .filter_map(|method| method.parse().ok())
        .collect();

    let headers = if config.allowed_headers.iter().any(|h| h == "*") {
        AllowHeaders::from(Any)
    } else {
        AllowHeaders::list(
            config
                .allowed_headers
                .iter()
                .filter_map(|header| HeaderName::try_from(header.as_str()).ok()),
        )
    };

    debug!("CORS: origins {:?}", config.allowed_origins);
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .max_age(Duration::from_secs(config.max_age_seconds))
}

/// Health check endpoint handler
///
/// Returns a 200 OK status code with "OK" in the body.
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Ready check endpoint handler
///
/// Returns a 200 OK status code with "Ready" in the body.
async fn readyz() -> impl IntoResponse {
    (StatusCode::OK, "Ready")
}

/// Prometheus text exposition of server and cluster metrics.
async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        metrics::encode_metrics(),
    )
}
