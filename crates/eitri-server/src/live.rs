/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Live subscriptions
//!
//! WebSocket endpoint for live log viewing. Each connection is registered with the
//! [`Hub`] under the room named by its `id` query parameter and runs two tasks:
//!
//! - a write pump draining the connection's queue to the socket and pinging the peer;
//! - a read pump handling inbound JSON messages.
//!
//! A `subscribe` message opens a dedicated follow of the named pod and broadcasts
//! every line into the connection's room as `{"data": "<line>"}`. Subscriptions are
//! not shared: two viewers of the same pod each hold their own upstream stream.

use crate::hub::{ClientHandle, ClientId, Hub};
use crate::metrics;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use eitri_cluster::k8s::PodLogSource;
use eitri_utils::config::Live;
use eitri_utils::telemetry::prelude::*;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant};
use tokio_util::sync::CancellationToken;

/// Connection and subscription tuning.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub since_seconds: i64,
    pub client_queue_size: usize,
    pub write_wait: Duration,
    pub pong_wait: Duration,
    pub ping_period: Duration,
    pub max_message_size: usize,
    pub default_namespace: String,
}

impl LiveConfig {
    pub fn from_settings(live: &Live, default_namespace: &str) -> Self {
        Self {
            since_seconds: live.since_seconds,
            client_queue_size: live.client_queue_size.max(1),
            write_wait: Duration::from_secs(live.write_wait_seconds),
            pong_wait: Duration::from_secs(live.pong_wait_seconds),
            ping_period: Duration::from_millis(live.ping_period_millis().max(1)),
            max_message_size: live.max_message_size,
            default_namespace: default_namespace.to_string(),
        }
    }
}

/// A message received from a viewer.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InboundMessage {
    /// `<namespace>:<action>`
    pub event: String,
    #[serde(default)]
    pub resource_name: String,
    #[serde(default)]
    pub resource_namespace: String,
    #[serde(default)]
    pub data: Value,
}

impl InboundMessage {
    pub fn action(&self) -> &str {
        self.event
            .rsplit_once(':')
            .map(|(_, action)| action)
            .unwrap_or(&self.event)
    }
}

/// Parses an inbound text frame. Embedded newlines are treated as spaces.
pub fn parse_inbound(text: &str) -> Result<InboundMessage, serde_json::Error> {
    let flattened = text.replace('\n', " ");
    serde_json::from_str(flattened.trim())
}

/// Wraps a log line or status message in the outbound frame shape.
pub fn frame(line: &str) -> String {
    json!({ "data": line }).to_string()
}

#[derive(Debug, Deserialize)]
pub struct ViewerParams {
    pub id: Option<String>,
}

/// Shared state of the WebSocket endpoint.
#[derive(Clone)]
pub struct LiveBridge {
    hub: Hub,
    logs: Arc<dyn PodLogSource>,
    config: LiveConfig,
}

impl LiveBridge {
    pub fn new(hub: Hub, logs: Arc<dyn PodLogSource>, config: LiveConfig) -> Self {
        Self { hub, logs, config }
    }

    /// Runs one viewer connection until the socket closes.
    pub async fn serve_connection(self, socket: WebSocket, room: String) {
        let client_id = self.hub.next_client_id();
        let (sender, queue) = mpsc::channel(self.config.client_queue_size);
        self.hub.register(ClientHandle {
            id: client_id,
            room: room.clone(),
            sender,
        });
        info!(client_id, room = %room, "Live viewer connected");

        let (sink, stream) = socket.split();
        let done = CancellationToken::new();
        let writer = tokio::spawn(write_pump(
            sink,
            queue,
            self.config.clone(),
            done.clone(),
            client_id,
        ));

        self.read_pump(stream, &room, client_id, &done).await;

        done.cancel();
        self.hub.leave_room(client_id);
        // Dropping the hub's sender ends the write pump
        self.hub.unregister(client_id);
        if let Err(e) = writer.await {
            warn!(client_id, "Write pump failed: {}", e);
        }
        info!(client_id, room = %room, "Live viewer disconnected");
    }

    async fn read_pump(
        &self,
        mut stream: SplitStream<WebSocket>,
        room: &str,
        client_id: ClientId,
        done: &CancellationToken,
    ) {
        let mut subscription: Option<CancellationToken> = None;
        let mut joined = false;

        loop {
            let next = tokio::select! {
                _ = done.cancelled() => break,
                next = timeout(self.config.pong_wait, stream.next()) => next,
            };
            let message = match next {
                Err(_) => {
                    info!(
                        client_id,
                        "No frames from viewer within {:?}, closing", self.config.pong_wait
                    );
                    break;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    debug!(client_id, "Viewer read failed: {}", e);
                    break;
                }
                Ok(Some(Ok(message))) => message,
            };

            match message {
                Message::Text(text) => {
                    let inbound = match parse_inbound(&text) {
                        Ok(inbound) => inbound,
                        Err(e) => {
                            warn!(client_id, "Ignoring malformed viewer message: {}", e);
                            continue;
                        }
                    };
                    if inbound.action() != "subscribe" {
                        debug!(client_id, "Ignoring viewer event {}", inbound.event);
                        continue;
                    }
                    if inbound.resource_name.trim().is_empty() {
                        warn!(client_id, "Ignoring subscribe without resource_name");
                        continue;
                    }

                    if !joined {
                        self.hub.join_room(client_id);
                        joined = true;
                    }
                    if let Some(previous) = subscription.take() {
                        previous.cancel();
                    }
                    let cancel = done.child_token();
                    subscription = Some(cancel.clone());
                    self.subscribe(inbound, room.to_string(), client_id, cancel);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }

        if let Some(active) = subscription {
            active.cancel();
        }
    }

    fn subscribe(
        &self,
        inbound: InboundMessage,
        room: String,
        client_id: ClientId,
        cancel: CancellationToken,
    ) {
        let namespace = if inbound.resource_namespace.trim().is_empty() {
            self.config.default_namespace.clone()
        } else {
            inbound.resource_namespace
        };
        info!(
            client_id,
            room = %room,
            pod = %inbound.resource_name,
            "Starting live tail of {}/{}",
            namespace,
            inbound.resource_name
        );
        metrics::live_subscriptions_total().inc();

        tokio::spawn(stream_to_room(
            self.hub.clone(),
            self.logs.clone(),
            LiveTarget {
                namespace,
                pod: inbound.resource_name,
                room,
            },
            self.config.since_seconds,
            cancel,
        ));
    }
}

struct LiveTarget {
    namespace: String,
    pod: String,
    room: String,
}

async fn stream_to_room(
    hub: Hub,
    logs: Arc<dyn PodLogSource>,
    target: LiveTarget,
    since_seconds: i64,
    cancel: CancellationToken,
) {
    let opened = tokio::select! {
        _ = cancel.cancelled() => return,
        opened = logs.follow(&target.namespace, &target.pod, Some(since_seconds)) => opened,
    };
    let mut lines = match opened {
        Ok(lines) => lines,
        Err(e) => {
            warn!(pod = %target.pod, room = %target.room, "Cannot open live tail: {}", e);
            let status = frame(&format!("error: {}", e.server_message()));
            let _ = hub.broadcast(&target.room, status).await;
            return;
        }
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            next = lines.next() => match next {
                Some(Ok(line)) => {
                    trace!(pod = %target.pod, "{}", line);
                    if hub.broadcast(&target.room, frame(&line)).await.is_err() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!(pod = %target.pod, room = %target.room, "Live tail failed: {}", e);
                    break;
                }
                None => break,
            },
        }
    }
    debug!(pod = %target.pod, room = %target.room, "Live tail stopped");
}

async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut queue: mpsc::Receiver<String>,
    config: LiveConfig,
    done: CancellationToken,
    client_id: ClientId,
) {
    let mut ping = interval_at(Instant::now() + config.ping_period, config.ping_period);

    loop {
        let message = tokio::select! {
            next = queue.recv() => match next {
                Some(payload) => Message::Text(payload),
                None => {
                    let _ = timeout(config.write_wait, sink.send(Message::Close(None))).await;
                    break;
                }
            },
            _ = ping.tick() => Message::Ping(Vec::new()),
        };

        match timeout(config.write_wait, sink.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(client_id, "Viewer write failed: {}", e);
                break;
            }
            Err(_) => {
                warn!(client_id, "Viewer write timed out");
                break;
            }
        }
    }
    done.cancel();
}

/// Upgrades `GET /ws?id=<room>` into a live viewer connection.
pub async fn ws_handler(
    State(bridge): State<LiveBridge>,
    Query(params): Query<ViewerParams>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(room) = params.id.filter(|id| !id.trim().is_empty()) else {
        warn!("Rejecting live connection without an id");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Missing id query parameter"})),
        )
            .into_response();
    };
    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    upgrade
        .max_message_size(bridge.config.max_message_size)
        .on_upgrade(move |socket| bridge.serve_connection(socket, room))
}
