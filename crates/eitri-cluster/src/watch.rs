/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Pod watch feeding the lifecycle controller.
//!
//! Watches pods carrying the marker label and translates watcher events into
//! [`ControllerEvent`]s. Relists surface as `ResyncStarted`, a replay of every pod as
//! `Applied`, then `ResyncDone`, so pods deleted while the watch was disconnected are
//! still noticed.

use crate::controller::{ControllerEvent, PodSnapshot};
use eitri_models::models::PodPhase;
use eitri_utils::telemetry::prelude::*;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Reads the fields the controller needs from a pod. Pods without a name are skipped.
pub fn pod_snapshot(pod: &Pod, correlation_label: &str) -> Option<PodSnapshot> {
    let name = pod.metadata.name.clone()?;
    let namespace = pod.metadata.namespace.clone().unwrap_or_default();
    let phase = PodPhase::from_status(pod.status.as_ref().and_then(|s| s.phase.as_deref()));
    let job_id = pod
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(correlation_label))
        .and_then(|value| Uuid::parse_str(value).ok());

    Some(PodSnapshot {
        name,
        namespace,
        phase,
        job_id,
    })
}

/// Maps one watcher event onto the controller's queue vocabulary.
pub fn translate(event: watcher::Event<Pod>, correlation_label: &str) -> Option<ControllerEvent> {
    match event {
        watcher::Event::Apply(pod) | watcher::Event::InitApply(pod) => {
            pod_snapshot(&pod, correlation_label).map(ControllerEvent::Applied)
        }
        watcher::Event::Delete(pod) => {
            pod_snapshot(&pod, correlation_label).map(ControllerEvent::Deleted)
        }
        watcher::Event::Init => Some(ControllerEvent::ResyncStarted),
        watcher::Event::InitDone => Some(ControllerEvent::ResyncDone),
    }
}

/// Where and what to watch.
#[derive(Debug, Clone)]
pub struct PodWatchConfig {
    /// `None` watches all namespaces
    pub namespace: Option<String>,
    /// Label selector, `key=value`
    pub selector: String,
    pub correlation_label: String,
}

/// Runs the pod watch until `shutdown` fires or the controller queue closes.
///
/// Watch errors are logged; the watcher backs off and re-establishes the watch itself.
pub async fn run_pod_watch(
    client: Client,
    config: PodWatchConfig,
    events: mpsc::Sender<ControllerEvent>,
    shutdown: CancellationToken,
) {
    let pods: Api<Pod> = match config.namespace.as_deref() {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    };
    info!(
        "Watching pods with selector {} in {}",
        config.selector,
        config.namespace.as_deref().unwrap_or("all namespaces")
    );

    let watch_config = watcher::Config::default().labels(&config.selector);
    let mut stream = watcher(pods, watch_config).default_backoff().boxed();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            next = stream.next() => match next {
                None => {
                    warn!("Pod watch stream ended");
                    break;
                }
                Some(Ok(event)) => {
                    let Some(event) = translate(event, &config.correlation_label) else {
                        continue;
                    };
                    if events.send(event).await.is_err() {
                        debug!("Controller queue closed, stopping pod watch");
                        break;
                    }
                }
                Some(Err(e)) => warn!("Pod watch error: {}", e),
            },
        }
    }
    info!("Pod watch stopped");
}
