//! WebSocket stream of wallet events
//!
//! Every [`WalletEvent`] emitted on the registry's bus is pushed to each
//! connected client as JSON.

use crate::api::handlers::ApiState;
use crate::multisig::{EventBus, WalletEvent};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Connection-level notices, framed like wallet events
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WsNotice {
    /// Connection established
    Connected { message: String },
    /// The client fell behind and missed events
    Lagged { skipped: u64 },
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> impl IntoResponse {
    let events = state.events.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, events))
}

fn encode_event(event: &WalletEvent) -> Option<Message> {
    serde_json::to_string(event)
        .ok()
        .map(|json| Message::Text(json.into()))
}

fn encode_notice(notice: &WsNotice) -> Option<Message> {
    serde_json::to_string(notice)
        .ok()
        .map(|json| Message::Text(json.into()))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, events: Arc<EventBus>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = events.subscribe();
    log::info!(
        "WebSocket client connected ({} subscribers)",
        events.subscriber_count()
    );

    let welcome = WsNotice::Connected {
        message: "Connected to sigsafe event stream".to_string(),
    };
    if let Some(msg) = encode_notice(&welcome) {
        let _ = sender.send(msg).await;
    }

    let mut send_task = tokio::spawn(async move {
        loop {
            let msg = match rx.recv().await {
                Ok(event) => encode_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("WebSocket client lagged, {} events dropped", skipped);
                    encode_notice(&WsNotice::Lagged { skipped })
                }
                Err(RecvError::Closed) => break,
            };
            if let Some(msg) = msg {
                if sender.send(msg).await.is_err() {
                    break;
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Ok(Message::Text(text)) => {
                    log::debug!("Ignoring client message: {}", text);
                }
                Err(e) => {
                    log::warn!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    log::info!("WebSocket connection closed");
}
