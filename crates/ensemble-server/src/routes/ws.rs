//! WebSocket observer channel.
//!
//! Outbound events are drained from the observer's queue by a forwarding
//! task. Inbound commands each run on their own task, so a slow prediction
//! does not hold up a toggle from the same observer.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use ensemble_realtime::{ClientCommand, ServerEvent};
use futures::{SinkExt, StreamExt};
use tracing::{error, warn};

use crate::state::AppState;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let broadcaster = state.broadcaster.clone();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (id, mut events) = broadcaster.connect();

    let forward_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(text) => {
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("Failed to serialize {} event: {}", event.name(), e),
            }
        }
    });

    while let Some(result) = ws_rx.next().await {
        let text = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!("WebSocket error from observer {}: {}", id, e);
                break;
            }
        };

        match serde_json::from_str::<ClientCommand>(text.as_str()) {
            Ok(command) => {
                let broadcaster = broadcaster.clone();
                tokio::spawn(async move { broadcaster.handle(id, command).await });
            }
            Err(e) => {
                warn!("Invalid message from observer {}: {}", id, e);
                broadcaster.send_to(
                    &id,
                    ServerEvent::Error {
                        message: format!("Invalid message: {}", e),
                    },
                );
            }
        }
    }

    broadcaster.disconnect(&id);
    forward_task.abort();
}
