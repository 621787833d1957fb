/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Drives a running controller through a pod's whole life, the way the watch feed does.

use async_trait::async_trait;
use eitri_cluster::archive::LogArchive;
use eitri_cluster::controller::{
    ControllerEvent, JobPhaseStore, PodLifecycleController, PodSnapshot,
};
use eitri_cluster::k8s::{LogLineStream, PodLogSource};
use eitri_cluster::ClusterError;
use eitri_models::models::PodPhase;
use futures::channel::mpsc as fmpsc;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Default)]
struct Phases {
    history: Mutex<Vec<(Uuid, PodPhase)>>,
}

impl JobPhaseStore for Phases {
    fn update_phase(
        &self,
        job_id: Uuid,
        phase: &PodPhase,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.history.lock().unwrap().push((job_id, phase.clone()));
        Ok(())
    }
}

#[derive(Default)]
struct FedLogs {
    streams: Mutex<HashMap<String, fmpsc::UnboundedReceiver<String>>>,
}

#[async_trait]
impl PodLogSource for FedLogs {
    async fn follow(
        &self,
        _namespace: &str,
        pod: &str,
        _since_seconds: Option<i64>,
    ) -> Result<LogLineStream, ClusterError> {
        match self.streams.lock().unwrap().remove(pod) {
            Some(rx) => Ok(rx.map(Ok).boxed()),
            None => Err(ClusterError::Invalid(format!("no stream for {}", pod))),
        }
    }
}

fn pod(job_id: Uuid, phase: PodPhase) -> ControllerEvent {
    ControllerEvent::Applied(PodSnapshot {
        name: "p1".to_string(),
        namespace: "jobs".to_string(),
        phase,
        job_id: Some(job_id),
    })
}

#[tokio::test]
async fn test_pod_lifecycle_is_archived_and_phase_ends_succeeded() {
    let dir = tempfile::tempdir().unwrap();
    let archive = LogArchive::new(dir.path());
    let phases = Arc::new(Phases::default());
    let logs = Arc::new(FedLogs::default());
    let (feed, rx) = fmpsc::unbounded();
    logs.streams.lock().unwrap().insert("p1".to_string(), rx);

    let (tx, events) = mpsc::channel(16);
    let controller = PodLifecycleController::new(
        phases.clone(),
        logs.clone(),
        archive.clone(),
        Some(60),
        tx.clone(),
    );
    let shutdown = CancellationToken::new();
    let running = tokio::spawn(controller.run(events, shutdown.clone()));

    let job_id = Uuid::new_v4();
    tx.send(pod(job_id, PodPhase::Pending)).await.unwrap();
    tx.send(pod(job_id, PodPhase::Running)).await.unwrap();
    // A relist replaying the same pod must not start a second tail
    tx.send(ControllerEvent::ResyncStarted).await.unwrap();
    tx.send(pod(job_id, PodPhase::Running)).await.unwrap();
    tx.send(ControllerEvent::ResyncDone).await.unwrap();

    feed.unbounded_send("step 1".to_string()).unwrap();
    feed.unbounded_send("step 2".to_string()).unwrap();
    drop(feed);
    tx.send(pod(job_id, PodPhase::Succeeded)).await.unwrap();

    let mut logs: Vec<String> = Vec::new();
    for _ in 0..100 {
        let files = archive.read_job(job_id).await.unwrap();
        if let Some(file) = files.first() {
            logs = file.file_data.logs.clone();
            if logs == ["step 1", "step 2"] {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(logs, vec!["step 1", "step 2"]);

    shutdown.cancel();
    running.await.unwrap();

    let history = phases.history.lock().unwrap();
    assert_eq!(history.last(), Some(&(job_id, PodPhase::Succeeded)));
    assert!(history.iter().all(|(id, _)| *id == job_id));
}
