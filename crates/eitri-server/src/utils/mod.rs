/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Utility functions for the eitri server.

use eitri_utils::telemetry::prelude::*;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

pub mod encryption;

/// Waits for the shutdown signal, then cancels the background workers.
///
/// Passed to `axum::serve(..).with_graceful_shutdown`.
pub async fn shutdown(shutdown_rx: oneshot::Receiver<()>, workers: CancellationToken) {
    let _ = shutdown_rx.await;
    info!("Shutdown signal received, stopping background workers");
    workers.cancel();
}
