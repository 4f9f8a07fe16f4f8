//! Connection registry and per-socket lifecycle.
//!
//! Each accepted WebSocket gets the next monotone `ConnId`, a bounded
//! outbound queue drained by a writer task, and a reader task that
//! decodes and routes inbound frames. Teardown on any exit path
//! removes the connection from the registry and fires the
//! `Disconnected` hook exactly once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use marionette_core::ids::ConnId;
use marionette_core::protocol::Inbound;
use tokio::sync::mpsc;

use crate::registry::{HandlerRegistry, HookRegistry, Lifecycle};
use crate::store::StoreCell;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Outcome of queueing a frame for one connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Frame handed to the connection's writer task.
    Queued,
    /// Connection exists but its outbound queue rejected the frame.
    Rejected,
    /// No such connection. Sends to stale ids are expected no-ops.
    Absent,
}

/// Registry of live connections, keyed by monotonically assigned id.
///
/// An id present in the map denotes a currently writable connection;
/// absence means "send is a no-op for that id".
#[derive(Debug)]
pub struct ConnectionRegistry {
    conns: DashMap<ConnId, mpsc::Sender<String>>,
    next_id: AtomicU64,
    max_send_queue: usize,
}

impl ConnectionRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            conns: DashMap::new(),
            next_id: AtomicU64::new(1),
            max_send_queue,
        }
    }

    /// Assign the next id and create the connection's outbound queue.
    /// Ids start at 1 and are never reused.
    pub fn register(&self) -> (ConnId, mpsc::Receiver<String>) {
        let id = ConnId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        self.conns.insert(id, tx);
        (id, rx)
    }

    /// Remove a connection. Dropping its sender ends the writer task.
    pub fn unregister(&self, id: ConnId) -> bool {
        self.conns.remove(&id).is_some()
    }

    /// Queue a frame for one connection without blocking. A full queue
    /// drops the frame rather than stalling the caller.
    pub fn try_send(&self, id: ConnId, frame: String) -> SendOutcome {
        let Some(tx) = self.conns.get(&id) else {
            return SendOutcome::Absent;
        };
        match tx.try_send(frame) {
            Ok(()) => SendOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(conn_id = %id, "outbound queue full, dropping frame");
                SendOutcome::Rejected
            }
            // Writer already gone; indistinguishable from a disconnect race.
            Err(mpsc::error::TrySendError::Closed(_)) => SendOutcome::Absent,
        }
    }

    pub fn contains(&self, id: ConnId) -> bool {
        self.conns.contains_key(&id)
    }

    /// Snapshot of live connection ids, sorted.
    pub fn ids(&self) -> Vec<ConnId> {
        let mut ids: Vec<ConnId> = self.conns.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    pub fn count(&self) -> usize {
        self.conns.len()
    }
}

/// Drive one accepted WebSocket until it closes.
///
/// Fires the `Connected` hook synchronously after registration, before
/// any frame is read, and the `Disconnected` hook after teardown.
pub(crate) async fn handle_socket(
    socket: WebSocket,
    registry: Arc<ConnectionRegistry>,
    handlers: Arc<HandlerRegistry>,
    hooks: Arc<HookRegistry>,
    store: StoreCell,
) {
    let (id, mut rx) = registry.register();
    tracing::info!(conn_id = %id, "client connected");
    hooks.fire(Lifecycle::Connected, id).await;

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer: drain the outbound queue into the socket, with a
    // periodic heartbeat ping. Ends when the queue's sender is dropped
    // (unregistration) or a write fails.
    let mut writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(HEARTBEAT_INTERVAL);
        ping.tick().await; // consume the immediate first tick

        loop {
            tokio::select! {
                frame = rx.recv() => match frame {
                    Some(text) => {
                        if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = ping.tick() => {
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Reader: decode and route every inbound frame. A malformed frame
    // is dropped and the loop continues; only socket errors and close
    // frames end it.
    let mut reader = tokio::spawn(async move {
        loop {
            let msg = match ws_rx.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(err)) => {
                    tracing::warn!(conn_id = %id, error = %err, "socket read failed");
                    break;
                }
                None => break,
            };
            match msg {
                WsMessage::Text(text) => route_frame(&text, id, &handlers, &store).await,
                WsMessage::Close(_) => {
                    tracing::debug!(conn_id = %id, "client closed connection");
                    break;
                }
                // axum answers pings automatically
                _ => {}
            }
        }
    });

    // Either task ending tears the whole connection down. Abort the
    // survivor before teardown: no frame may be decoded or handler
    // invoked once the connection counts as closed.
    tokio::select! {
        _ = &mut writer => {}
        _ = &mut reader => {}
    }
    writer.abort();
    reader.abort();

    registry.unregister(id);
    hooks.fire(Lifecycle::Disconnected, id).await;
    tracing::info!(conn_id = %id, "client disconnected");
}

async fn route_frame(text: &str, id: ConnId, handlers: &HandlerRegistry, store: &StoreCell) {
    let inbound: Inbound = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(err) => {
            // Liveness over strict conformance: one bad frame must not
            // kill the connection.
            tracing::debug!(conn_id = %id, error = %err, "dropping undecodable frame");
            return;
        }
    };

    match inbound {
        Inbound::Action { handler, params } => handlers.invoke(&handler, params, id).await,
        Inbound::StoreChange { store: snapshot } => store.update(snapshot),
        Inbound::Unknown => {}
    }
}
