//! WebSocket patch stream.
//!
//! On connect a client receives the latest successful patch per symbol
//! (state replay), then every new patch as it is produced. Delivery uses a
//! per-client unbounded channel: `broadcast` never blocks the event loop,
//! and a client whose forward task has ended simply counts as a failure and
//! is pruned.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::patch::Patch;
use crate::runtime::SessionStatus;

/// Wire shape of one patch message. Round-trips through JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchMessage {
    pub kind: String,
    pub id: String,
    pub symbol_id: String,
    pub js_body: String,
    pub source_text: String,
    pub version: u64,
}

impl From<&Patch> for PatchMessage {
    fn from(patch: &Patch) -> Self {
        Self {
            kind: "patch".to_string(),
            id: patch.id.clone(),
            symbol_id: patch.symbol_id.clone(),
            js_body: patch.js_body.clone(),
            source_text: patch.source_text.clone(),
            version: patch.version,
        }
    }
}

/// Outcome of one broadcast attempt across all connected clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub success_count: usize,
    pub failure_count: usize,
}

/// Connected WebSocket clients, keyed by an id handed out at registration.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    next_id: AtomicU64,
    clients: Mutex<HashMap<u64, mpsc::UnboundedSender<String>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // No critical section here ever panics; a poisoned guard still holds
    // valid data, so recover it instead of propagating the poison.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, mpsc::UnboundedSender<String>>> {
        self.clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, tx: mpsc::UnboundedSender<String>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, tx);
        id
    }

    pub fn unregister(&self, id: u64) {
        self.lock().remove(&id);
    }

    pub fn client_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver `patch` to every connected client. One client failing never
    /// aborts delivery to the rest; failed clients are dropped from the
    /// registry. Zero clients is a successful no-op.
    pub fn broadcast(&self, patch: &Patch) -> DeliveryReport {
        let message = PatchMessage::from(patch);
        let mut clients = self.lock();

        let json = match serde_json::to_string(&message) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!(%err, "failed to serialize patch message");
                return DeliveryReport {
                    success_count: 0,
                    failure_count: clients.len(),
                };
            }
        };

        let mut success_count = 0;
        let mut failed: Vec<u64> = Vec::new();
        for (&id, tx) in clients.iter() {
            if tx.send(json.clone()).is_ok() {
                success_count += 1;
            } else {
                failed.push(id);
            }
        }
        let failure_count = failed.len();
        for id in failed {
            clients.remove(&id);
        }

        DeliveryReport {
            success_count,
            failure_count,
        }
    }
}

#[derive(Clone)]
pub struct WsState {
    pub clients: Arc<ClientRegistry>,
    pub status: Arc<SessionStatus>,
}

pub fn router(state: WsState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WsState) {
    let (mut sender, mut receiver) = socket.split();

    // Replay the current world before the client sees live traffic.
    let replay = state.status.log.read().await.replay_patches();
    for patch in &replay {
        let message = PatchMessage::from(patch);
        let json = match serde_json::to_string(&message) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!(%err, "failed to serialize replay patch");
                continue;
            }
        };
        if sender.send(Message::Text(json.into())).await.is_err() {
            return;
        }
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let client_id = state.clients.register(tx);
    tracing::debug!(client_id, "websocket client connected");

    loop {
        tokio::select! {
            outgoing = rx.recv() => match outgoing {
                Some(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            incoming = receiver.next() => match incoming {
                // The stream is one-way; inbound traffic is only drained so
                // pings and close frames are honored.
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.clients.unregister(client_id);
    tracing::debug!(client_id, "websocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::now_ms;

    fn patch(symbol: &str) -> Patch {
        Patch {
            id: format!("{symbol}#1"),
            symbol_id: symbol.to_string(),
            js_body: "js".into(),
            source_text: "src".into(),
            version: 1,
            timestamp_ms: now_ms(),
        }
    }

    #[test]
    fn test_broadcast_with_zero_clients_is_a_noop() {
        let registry = ClientRegistry::new();
        let report = registry.broadcast(&patch("scr_a"));
        assert_eq!(report, DeliveryReport { success_count: 0, failure_count: 0 });
    }

    #[tokio::test]
    async fn test_broadcast_counts_and_prunes_failed_clients() {
        let registry = ClientRegistry::new();
        let (alive_tx, mut alive_rx) = mpsc::unbounded_channel();
        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        drop(dead_rx);
        registry.register(alive_tx);
        registry.register(dead_tx);

        let report = registry.broadcast(&patch("scr_a"));
        assert_eq!(report, DeliveryReport { success_count: 1, failure_count: 1 });
        assert_eq!(registry.client_count(), 1, "dead client must be pruned");

        let json = alive_rx.recv().await.expect("delivered");
        let message: PatchMessage = serde_json::from_str(&json).expect("valid json");
        assert_eq!(message.kind, "patch");
        assert_eq!(message.symbol_id, "scr_a");
    }

    #[test]
    fn test_patch_message_roundtrips_through_json() {
        let message = PatchMessage::from(&patch("scr_fire"));
        let json = serde_json::to_string(&message).expect("serialize");
        let back: PatchMessage = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(message, back);
    }
}
