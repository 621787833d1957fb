/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Pod Lifecycle Controller
//!
//! Single consumer of the pod event queue. It owns the table of tracked pods and is
//! the only place log tailers are started, so "at most one tailer per pod name"
//! holds by construction.
//!
//! ```mermaid
//! stateDiagram-v2
//!     [*] --> Idle: Applied (not Running)
//!     [*] --> Active: Applied (Running)
//!     Idle --> Active: Applied (Running)
//!     Active --> Active: Applied (any phase)
//!     Active --> Finished: tailer exited, pod still Running
//!     Active --> [*]: tailer exited, pod deleted or no longer Running
//!     Finished --> [*]: Applied (not Running) / Deleted
//!     Idle --> [*]: Deleted
//! ```
//!
//! Per pod, events are handled in queue order. Phase writes are best-effort: a store
//! failure is logged and processing continues. Tailers are not stopped when a pod
//! leaves `Running` or is deleted; they run until their stream ends. Only controller
//! shutdown cancels them.

use crate::archive::LogArchive;
use crate::k8s::PodLogSource;
use crate::metrics;
use crate::tailer::{tail_pod, TailOutcome, TailTarget};
use eitri_models::models::PodPhase;
use eitri_utils::telemetry::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Persists the phase observed on a job's pods.
pub trait JobPhaseStore: Send + Sync {
    fn update_phase(
        &self,
        job_id: Uuid,
        phase: &PodPhase,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// The fields of a pod the controller acts on.
#[derive(Debug, Clone, PartialEq)]
pub struct PodSnapshot {
    pub name: String,
    pub namespace: String,
    pub phase: PodPhase,
    /// Parsed from the correlation label; `None` if missing or not a UUID
    pub job_id: Option<Uuid>,
}

/// Everything the controller consumes, in one ordered queue.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    /// A pod was added or updated (including relist replays).
    Applied(PodSnapshot),
    /// A pod left the cluster.
    Deleted(PodSnapshot),
    /// The watch is relisting; pods not re-applied before `ResyncDone` are gone.
    ResyncStarted,
    ResyncDone,
    /// A tailer the controller started has stopped.
    TailerExited {
        pod: String,
        generation: u64,
        outcome: TailOutcome,
    },
}

#[derive(Debug, Clone)]
pub enum TailerState {
    /// No tailer has been started for the pod's current run.
    Idle,
    Active {
        generation: u64,
        cancel: CancellationToken,
    },
    /// The tailer ended while the pod was still Running; it is not restarted.
    Finished,
}

#[derive(Debug, Clone)]
pub struct TrackedPod {
    pub job_id: Uuid,
    pub namespace: String,
    pub phase: PodPhase,
    pub tailer: TailerState,
    /// Deleted from the cluster while its tailer was still draining.
    pub deleted: bool,
}

impl TrackedPod {
    pub fn has_active_tailer(&self) -> bool {
        matches!(self.tailer, TailerState::Active { .. })
    }
}

enum Action {
    StartTailer,
    Keep,
    Forget,
}

pub struct PodLifecycleController {
    tracked: HashMap<String, TrackedPod>,
    phases: Arc<dyn JobPhaseStore>,
    logs: Arc<dyn PodLogSource>,
    archive: LogArchive,
    tail_since_seconds: Option<i64>,
    events: mpsc::Sender<ControllerEvent>,
    tailers: CancellationToken,
    next_generation: u64,
    resync_seen: Option<HashSet<String>>,
}

impl PodLifecycleController {
    /// Creates a controller.
    ///
    /// # Arguments
    /// * `phases` - Where observed phases are persisted
    /// * `logs` - Log-fetch primitive handed to tailers
    /// * `archive` - Archive tailers write into
    /// * `tail_since_seconds` - Lookback used when a tailer opens its stream
    /// * `events` - Sender side of the controller's own queue; tailers report their exit on it
    pub fn new(
        phases: Arc<dyn JobPhaseStore>,
        logs: Arc<dyn PodLogSource>,
        archive: LogArchive,
        tail_since_seconds: Option<i64>,
        events: mpsc::Sender<ControllerEvent>,
    ) -> Self {
        Self {
            tracked: HashMap::new(),
            phases,
            logs,
            archive,
            tail_since_seconds,
            events,
            tailers: CancellationToken::new(),
            next_generation: 0,
            resync_seen: None,
        }
    }

    pub fn tracked(&self, pod: &str) -> Option<&TrackedPod> {
        self.tracked.get(pod)
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    pub fn active_tailers(&self) -> usize {
        self.tracked
            .values()
            .filter(|pod| pod.has_active_tailer())
            .count()
    }

    /// Consumes the queue until `shutdown` fires, then cancels every running tailer.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<ControllerEvent>,
        shutdown: CancellationToken,
    ) {
        info!("Starting pod lifecycle controller");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
            }
        }
        self.tailers.cancel();
        info!(
            "Pod lifecycle controller stopped with {} tracked pods",
            self.tracked.len()
        );
    }

    /// Applies one event to the tracked-pod table.
    pub fn handle(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Applied(pod) => {
                metrics::pod_events_total()
                    .with_label_values(&["applied"])
                    .inc();
                self.on_applied(pod);
            }
            ControllerEvent::Deleted(pod) => {
                metrics::pod_events_total()
                    .with_label_values(&["deleted"])
                    .inc();
                self.on_deleted(&pod.name);
            }
            ControllerEvent::ResyncStarted => {
                debug!("Pod watch relist started");
                self.resync_seen = Some(HashSet::new());
            }
            ControllerEvent::ResyncDone => self.on_resync_done(),
            ControllerEvent::TailerExited {
                pod,
                generation,
                outcome,
            } => self.on_tailer_exited(&pod, generation, outcome),
        }
    }

    fn on_applied(&mut self, pod: PodSnapshot) {
        let Some(job_id) = pod.job_id else {
            warn!(
                pod = %pod.name,
                "Pod carries no usable correlation label, ignoring"
            );
            return;
        };

        if let Some(seen) = self.resync_seen.as_mut() {
            seen.insert(pod.name.clone());
        }

        if let Err(e) = self.phases.update_phase(job_id, &pod.phase) {
            warn!(
                job_id = %job_id,
                pod = %pod.name,
                "Failed to persist job phase {}: {}", pod.phase, e
            );
        }

        let entry = self
            .tracked
            .entry(pod.name.clone())
            .or_insert_with(|| TrackedPod {
                job_id,
                namespace: pod.namespace.clone(),
                phase: pod.phase.clone(),
                tailer: TailerState::Idle,
                deleted: false,
            });
        entry.phase = pod.phase.clone();
        entry.deleted = false;

        let action = match (&entry.tailer, pod.phase.is_running()) {
            (TailerState::Idle, true) => Action::StartTailer,
            (TailerState::Active { .. }, _) => Action::Keep,
            (TailerState::Finished, true) => Action::Keep,
            (TailerState::Idle, false) | (TailerState::Finished, false) => Action::Forget,
        };

        match action {
            Action::StartTailer => {
                let target = TailTarget {
                    job_id: entry.job_id,
                    namespace: entry.namespace.clone(),
                    pod: pod.name.clone(),
                };
                let state = self.start_tailer(target);
                if let Some(entry) = self.tracked.get_mut(&pod.name) {
                    entry.tailer = state;
                }
            }
            Action::Keep => {
                trace!(pod = %pod.name, "Pod is {}, tailer state unchanged", pod.phase);
            }
            Action::Forget => {
                self.tracked.remove(&pod.name);
            }
        }
    }

    fn on_deleted(&mut self, name: &str) {
        match self.tracked.get_mut(name) {
            Some(entry) if entry.has_active_tailer() => {
                // The tailer sees end-of-stream on its own; the entry goes when it reports back
                debug!(pod = %name, "Pod deleted while its tailer is draining");
                entry.deleted = true;
            }
            Some(_) => {
                self.tracked.remove(name);
            }
            None => debug!(pod = %name, "Deleted pod was not tracked"),
        }
    }

    fn on_resync_done(&mut self) {
        let Some(seen) = self.resync_seen.take() else {
            return;
        };
        let vanished: Vec<String> = self
            .tracked
            .keys()
            .filter(|name| !seen.contains(*name))
            .cloned()
            .collect();
        for name in vanished {
            debug!(pod = %name, "Pod missing from relist, treating as deleted");
            self.on_deleted(&name);
        }
    }

    fn on_tailer_exited(&mut self, pod: &str, generation: u64, outcome: TailOutcome) {
        let Some(entry) = self.tracked.get_mut(pod) else {
            return;
        };
        match entry.tailer {
            TailerState::Active { generation: current, .. } if current == generation => {}
            // An exit from an earlier run of a pod with the same name
            _ => return,
        }

        debug!(pod = %pod, "Tailer exited ({})", outcome.as_label());
        if entry.deleted || !entry.phase.is_running() {
            self.tracked.remove(pod);
        } else {
            entry.tailer = TailerState::Finished;
        }
    }

    fn start_tailer(&mut self, target: TailTarget) -> TailerState {
        self.next_generation += 1;
        let generation = self.next_generation;
        let cancel = self.tailers.child_token();

        let logs = self.logs.clone();
        let archive = self.archive.clone();
        let events = self.events.clone();
        let since = self.tail_since_seconds;
        let token = cancel.clone();

        info!(job_id = %target.job_id, pod = %target.pod, "Starting log tailer");
        metrics::active_tailers().inc();

        tokio::spawn(async move {
            let outcome = tail_pod(logs.as_ref(), &archive, &target, since, token).await;
            metrics::active_tailers().dec();
            metrics::tailer_exits_total()
                .with_label_values(&[outcome.as_label()])
                .inc();

            let exited = ControllerEvent::TailerExited {
                pod: target.pod,
                generation,
                outcome,
            };
            if events.send(exited).await.is_err() {
                debug!("Controller gone before tailer exit was reported");
            }
        });

        TailerState::Active { generation, cancel }
    }
}
