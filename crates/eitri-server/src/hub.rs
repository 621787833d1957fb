/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Hub
//!
//! Fan-out of log lines to live viewer connections, grouped into rooms keyed by job
//! identifier. All registry state is owned by a single task; [`Hub`] is the cheap,
//! cloneable handle connections use to talk to it.
//!
//! ```mermaid
//! flowchart LR
//!     C1[connection] -- register/join/leave --> H((hub task))
//!     S[live tail] -- broadcast --> H
//!     H -- try_send --> Q1[client queue]
//!     H -- try_send --> Q2[client queue]
//! ```
//!
//! Delivery never waits on a client: a full client queue loses that message, the hub
//! counts it and moves on.

use crate::metrics;
use eitri_utils::telemetry::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

pub type ClientId = u64;

/// A registered connection: where it listens and how to reach its writer.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub id: ClientId,
    pub room: String,
    pub sender: mpsc::Sender<String>,
}

/// Point-in-time view of the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubSnapshot {
    pub clients: usize,
    /// Room name to member count
    pub rooms: HashMap<String, usize>,
    pub dropped: u64,
}

#[derive(Debug, Error)]
pub enum HubError {
    #[error("hub is not running")]
    Closed,
}

enum Control {
    Register(ClientHandle),
    Unregister(ClientId),
    JoinRoom(ClientId),
    LeaveRoom(ClientId),
    Snapshot(oneshot::Sender<HubSnapshot>),
}

struct Broadcast {
    room: String,
    payload: String,
}

#[derive(Clone)]
pub struct Hub {
    control: mpsc::UnboundedSender<Control>,
    broadcast: mpsc::Sender<Broadcast>,
    next_id: Arc<AtomicU64>,
}

#[derive(Default)]
struct Registry {
    clients: HashMap<ClientId, ClientHandle>,
    rooms: HashMap<String, HashSet<ClientId>>,
    dropped: u64,
}

impl Registry {
    fn apply(&mut self, control: Control) {
        match control {
            Control::Register(client) => {
                debug!(client_id = client.id, "Registered client");
                self.clients.insert(client.id, client);
            }
            Control::Unregister(id) => {
                self.leave(id);
                if self.clients.remove(&id).is_some() {
                    debug!(client_id = id, "Unregistered client");
                }
            }
            Control::JoinRoom(id) => match self.clients.get(&id) {
                Some(client) => {
                    self.rooms.entry(client.room.clone()).or_default().insert(id);
                    debug!(client_id = id, room = %client.room, "Client joined room");
                }
                None => debug!(client_id = id, "Join for unknown client ignored"),
            },
            Control::LeaveRoom(id) => self.leave(id),
            Control::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
        metrics::hub_clients().set(self.clients.len() as i64);
        metrics::hub_rooms().set(self.rooms.len() as i64);
    }

    fn leave(&mut self, id: ClientId) {
        let Some(client) = self.clients.get(&id) else {
            return;
        };
        if let Some(members) = self.rooms.get_mut(&client.room) {
            members.remove(&id);
            if members.is_empty() {
                self.rooms.remove(&client.room);
                debug!(room = %client.room, "Removed empty room");
            }
        }
    }

    fn deliver(&mut self, message: Broadcast) {
        let Some(members) = self.rooms.get(&message.room) else {
            trace!(room = %message.room, "Broadcast to empty room");
            return;
        };
        for id in members {
            let Some(client) = self.clients.get(id) else {
                continue;
            };
            match client.sender.try_send(message.payload.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.dropped += 1;
                    metrics::hub_dropped_messages_total().inc();
                    debug!(
                        client_id = id,
                        room = %message.room,
                        "Client queue full, dropping message"
                    );
                }
                // The connection is tearing down and will unregister itself
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }

    fn snapshot(&self) -> HubSnapshot {
        HubSnapshot {
            clients: self.clients.len(),
            rooms: self
                .rooms
                .iter()
                .map(|(room, members)| (room.clone(), members.len()))
                .collect(),
            dropped: self.dropped,
        }
    }
}

impl Hub {
    /// Starts the hub task.
    ///
    /// # Arguments
    /// * `queue_size` - Capacity of the broadcast queue; producers wait when it is full
    /// * `shutdown` - Stops the task when cancelled
    pub fn spawn(queue_size: usize, shutdown: CancellationToken) -> Self {
        let (control_tx, mut control_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, mut broadcast_rx) = mpsc::channel::<Broadcast>(queue_size.max(1));

        tokio::spawn(async move {
            let mut registry = Registry::default();
            info!("Hub started");
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    Some(control) = control_rx.recv() => registry.apply(control),
                    Some(message) = broadcast_rx.recv() => registry.deliver(message),
                    else => break,
                }
            }
            metrics::hub_clients().set(0);
            metrics::hub_rooms().set(0);
            info!("Hub stopped");
        });

        Self {
            control: control_tx,
            broadcast: broadcast_tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn next_client_id(&self) -> ClientId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn register(&self, client: ClientHandle) {
        self.send_control(Control::Register(client));
    }

    /// Removes the client and its room membership. Unknown ids are ignored.
    pub fn unregister(&self, id: ClientId) {
        self.send_control(Control::Unregister(id));
    }

    /// Adds a registered client to its room. Joining twice is harmless.
    pub fn join_room(&self, id: ClientId) {
        self.send_control(Control::JoinRoom(id));
    }

    pub fn leave_room(&self, id: ClientId) {
        self.send_control(Control::LeaveRoom(id));
    }

    /// Queues `payload` for every member of `room`.
    pub async fn broadcast(&self, room: &str, payload: String) -> Result<(), HubError> {
        self.broadcast
            .send(Broadcast {
                room: room.to_string(),
                payload,
            })
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Returns `None` once the hub task has stopped.
    pub async fn snapshot(&self) -> Option<HubSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.control.send(Control::Snapshot(tx)).ok()?;
        rx.await.ok()
    }

    fn send_control(&self, control: Control) {
        if self.control.send(control).is_err() {
            debug!("Hub stopped, control message discarded");
        }
    }
}
