/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use crate::api::{self, AppState};
use crate::dal::DAL;
use crate::db::create_shared_connection_pool;
use crate::hub::Hub;
use crate::live::{LiveBridge, LiveConfig};
use crate::secrets::SecretResolver;
use crate::store::{JobStore, StorePhases};
use crate::submitter::{JobSubmitter, SubmitterLabels};
use crate::utils;
use crate::utils::encryption::key_from_config;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use eitri_cluster::archive::LogArchive;
use eitri_cluster::controller::PodLifecycleController;
use eitri_cluster::k8s::{create_k8s_client, KubeCluster};
use eitri_cluster::watch::{run_pod_watch, PodWatchConfig};
use eitri_utils::config::Settings;
use eitri_utils::telemetry::prelude::*;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("../eitri-models/migrations");

fn open_dal(config: &Settings, max_connections: u32) -> Result<DAL, Box<dyn std::error::Error>> {
    let connection_pool = create_shared_connection_pool(
        &config.database.url,
        &config.database.name,
        max_connections,
    )?;
    Ok(DAL::new(connection_pool))
}

/// Function to start the Eitri server
///
/// Runs migrations, connects to the cluster, starts the hub, the pod watch and the
/// lifecycle controller, then serves HTTP until ctrl-c.
pub async fn serve(config: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting Eitri server");

    info!("Creating database connection pool");
    let dal = open_dal(config, config.database.max_connections)?;
    info!("Database connection pool created successfully");

    info!("Running pending database migrations");
    let mut conn = dal.pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| format!("Failed to run migrations: {}", e))?;
    drop(conn);
    info!("Database migrations completed successfully");

    info!("Initializing encryption key");
    let key = Arc::new(key_from_config(config.secrets.encryption_key.as_deref())?);
    info!("Encryption key fingerprint: {}", key.fingerprint());

    info!("Connecting to Kubernetes");
    let client = create_k8s_client(config.cluster.kubeconfig_path.as_deref()).await?;
    let cluster = Arc::new(KubeCluster::new(client.clone()));

    let workers = CancellationToken::new();
    let jobs: Arc<dyn JobStore> = Arc::new(dal.clone());
    let archive = LogArchive::new(&config.archive.logs_path);

    info!("Starting pod lifecycle controller");
    let (events_tx, events_rx) = mpsc::channel(config.cluster.event_queue_size.max(1));
    let controller = PodLifecycleController::new(
        Arc::new(StorePhases::new(jobs.clone())),
        cluster.clone(),
        archive.clone(),
        Some(config.archive.tail_since_seconds),
        events_tx.clone(),
    );
    let controller_task = tokio::spawn(controller.run(events_rx, workers.clone()));

    let watch_config = PodWatchConfig {
        namespace: config.cluster.watch_namespace.clone(),
        selector: config.cluster.marker_selector(),
        correlation_label: config.cluster.correlation_label.clone(),
    };
    let watch_task = tokio::spawn(run_pod_watch(
        client,
        watch_config,
        events_tx,
        workers.clone(),
    ));

    let hub = Hub::spawn(config.live.hub_queue_size, workers.clone());
    let live = LiveBridge::new(
        hub,
        cluster.clone(),
        LiveConfig::from_settings(&config.live, &config.cluster.default_namespace),
    );

    let submitter = JobSubmitter::new(
        SecretResolver::new(Arc::new(dal.clone()), key),
        jobs.clone(),
        cluster.clone(),
        SubmitterLabels {
            marker_label: config.cluster.marker_label.clone(),
            marker_value: config.cluster.marker_value.clone(),
            correlation_label: config.cluster.correlation_label.clone(),
        },
        config.cluster.default_namespace.clone(),
    );

    let state = AppState {
        jobs,
        submitter: Arc::new(submitter),
        launcher: cluster,
        archive,
        live,
    };

    info!("Configuring API routes");
    let app = api::configure_api_routes(&config.cors).with_state(state);

    let addr = &config.server.bind_address;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for ctrl+c: {}", e);
        }
        shutdown_tx.send(()).ok();
    });

    info!("Eitri is now running");
    axum::serve(listener, app)
        .with_graceful_shutdown(utils::shutdown(shutdown_rx, workers.clone()))
        .await?;

    // Covers a server exit that did not come from the signal
    workers.cancel();
    let _ = tokio::join!(controller_task, watch_task);
    info!("Eitri stopped");
    Ok(())
}

/// Encrypts and stores a secret for an application.
pub fn set_secret(
    config: &Settings,
    application: Uuid,
    name: &str,
    value: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Setting secret '{}' for application {}", name, application);

    let dal = open_dal(config, 1)?;
    let key = key_from_config(config.secrets.encryption_key.as_deref())?;
    let resolver = SecretResolver::new(Arc::new(dal), Arc::new(key));
    let secret = resolver.set(application, name, value)?;

    info!(
        "Secret '{}' stored for application {}",
        secret.name, secret.application_id
    );
    Ok(())
}
