//! WebSocket handler for live session updates

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{AppState, SessionView};

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Full session state, sent on connect and after every change
    #[serde(rename = "session")]
    Session(SessionView),
    /// Error message
    #[serde(rename = "error")]
    Error { message: String },
}

/// Messages sent from client to server
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Escape key pressed
    #[serde(rename = "escape")]
    Escape,
    /// Ping to keep connection alive
    #[serde(rename = "ping")]
    Ping,
}

/// Handle WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send(socket: &mut WebSocket, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!("Failed to encode message: {}", e);
            true
        }
    }
}

/// Handle an individual WebSocket connection
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    let mut updates = state.session.subscribe();

    info!("WebSocket connected: {}", connection_id);

    // Current state first; later changes arrive through the watch channel
    let current = ServerMessage::Session(SessionView::from(&*updates.borrow_and_update()));
    if !send(&mut socket, &current).await {
        return;
    }

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let msg = ServerMessage::Session(SessionView::from(&*updates.borrow_and_update()));
                if !send(&mut socket, &msg).await {
                    break;
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Escape) => {
                                state.session.escape();
                            }
                            Ok(ClientMessage::Ping) => {}
                            Err(e) => {
                                debug!("Unrecognized client message: {}", e);
                                let msg = ServerMessage::Error {
                                    message: format!("unrecognized message: {}", e),
                                };
                                if !send(&mut socket, &msg).await {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket disconnected: {}", connection_id);
}
