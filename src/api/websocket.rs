//! Websocket fan-out of chain events
//!
//! Every connected client receives each broadcast envelope as JSON.
//! Envelopes sent by clients are re-injected into the broadcast port, so
//! peers can relay query frames through this node.

use crate::api::handlers::ApiState;
use crate::node::{ChainBroadcaster, Message};
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Websocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> impl IntoResponse {
    let broadcaster = state.broadcaster.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, broadcaster))
}

async fn handle_socket(socket: WebSocket, broadcaster: Arc<ChainBroadcaster>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = broadcaster.subscribe();

    // Forward broadcast envelopes to this client
    let mut send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    let json = match serde_json::to_string(&envelope) {
                        Ok(json) => json,
                        Err(e) => {
                            log::error!("failed to serialize envelope: {}", e);
                            continue;
                        }
                    };
                    if sender.send(WsMessage::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("websocket client lagging, {} envelopes dropped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Relay inbound envelopes back into the broadcast port
    let relay = broadcaster.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(WsMessage::Text(text)) => match serde_json::from_str::<Message>(&text) {
                    Ok(envelope) => relay.send(envelope),
                    Err(e) => log::debug!("ignoring malformed peer envelope: {}", e),
                },
                Ok(WsMessage::Close(_)) => break,
                Err(e) => {
                    log::warn!("websocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    log::info!("websocket connection closed");
}
