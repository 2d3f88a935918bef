//! Live subscriber fan-out.
//!
//! The drain loop serializes each non-empty batch once; every connected
//! dashboard receives the same payload through a broadcast channel. Zero
//! subscribers is a normal state, not an error.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use serde_json::json;
use tokio::sync::broadcast;

use strike_core::BroadcastPoint;

use crate::relay::Broadcaster;
use crate::web::AppState;

/// Fan-out sender for live strike batches.
#[derive(Clone)]
pub struct WsBroadcaster {
    tx: broadcast::Sender<String>,
}

impl WsBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        WsBroadcaster { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Broadcaster for WsBroadcaster {
    fn emit(&self, batch: &[BroadcastPoint]) {
        let payload = json!({
            "event": "strike_batch",
            "strikes": batch,
        })
        .to_string();
        // Send only fails when nobody is subscribed.
        let _ = self.tx.send(payload);
    }
}

/// GET /ws — upgrade and stream strike batches until the client leaves.
pub async fn ws_subscribe(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let rx = state.broadcaster.subscribe();
    ws.on_upgrade(move |socket| subscriber_session(socket, rx))
}

async fn subscriber_session(mut socket: WebSocket, mut rx: broadcast::Receiver<String>) {
    loop {
        tokio::select! {
            batch = rx.recv() => match batch {
                Ok(text) => {
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    eprintln!("[web] subscriber lagged, dropped {n} batches");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            inbound = socket.recv() => match inbound {
                // Dashboards send nothing we act on; drain until close.
                Some(Ok(_)) => {}
                _ => break,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_reaches_subscriber() {
        let broadcaster = WsBroadcaster::new(16);
        let mut rx = broadcaster.subscribe();

        broadcaster.emit(&[
            BroadcastPoint { lat: 51.5, lon: -0.12 },
            BroadcastPoint { lat: 48.8, lon: 2.35 },
        ]);

        let payload = rx.recv().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(json["event"], "strike_batch");
        assert_eq!(json["strikes"].as_array().unwrap().len(), 2);
        assert_eq!(json["strikes"][0]["lat"], 51.5);
        assert_eq!(json["strikes"][1]["lon"], 2.35);
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_noop() {
        let broadcaster = WsBroadcaster::new(16);
        assert_eq!(broadcaster.subscriber_count(), 0);
        broadcaster.emit(&[BroadcastPoint { lat: 0.0, lon: 0.0 }]);
    }

    #[tokio::test]
    async fn test_every_subscriber_gets_every_batch() {
        let broadcaster = WsBroadcaster::new(16);
        let mut rx1 = broadcaster.subscribe();
        let mut rx2 = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);

        broadcaster.emit(&[BroadcastPoint { lat: 1.0, lon: 2.0 }]);
        broadcaster.emit(&[BroadcastPoint { lat: 3.0, lon: 4.0 }]);

        for rx in [&mut rx1, &mut rx2] {
            let first: serde_json::Value =
                serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
            let second: serde_json::Value =
                serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
            assert_eq!(first["strikes"][0]["lat"], 1.0);
            assert_eq!(second["strikes"][0]["lat"], 3.0);
        }
    }
}
