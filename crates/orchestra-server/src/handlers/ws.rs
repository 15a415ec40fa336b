//! `WS /execution/{run_id}` — mirrors the event stream of a run already
//! in flight via `/pipeline/run` or `/automate`; it never starts a run of
//! its own. A client that wants to watch a run opens this socket with
//! that run's id (client-supplied or returned by the starting call)
//! before or shortly after kicking it off.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::SinkExt;
use tokio::sync::broadcast;
use tracing::warn;

use crate::EngineState;

pub async fn ws_handler(ws: WebSocketUpgrade, Path(run_id): Path<String>, State(state): State<Arc<EngineState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, run_id, state))
}

async fn handle_socket(socket: WebSocket, run_id: String, state: Arc<EngineState>) {
    let (mut sender, _receiver) = socket.split();

    let mut rx = match state.run_events.read().await.get(&run_id) {
        Some(tx) => tx.subscribe(),
        None => {
            let _ = sender
                .send(Message::Text(format!(r#"{{"type":"run_error","message":"no in-flight run '{run_id}'"}}"#).into()))
                .await;
            return;
        }
    };

    loop {
        match rx.recv().await {
            Ok(event) => {
                let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
                if sender.send(Message::Text(data.into())).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(%run_id, skipped, "websocket mirror fell behind, some events were dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
