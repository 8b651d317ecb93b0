//! WebSocket handler for live refresh notifications

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use super::protocol::{ClientMessage, ServerMessage};
use super::server::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Forward reloads to one client and answer its pings until either side goes away.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.update_tx.subscribe();
    tracing::debug!(%client_id, "websocket client connected");

    loop {
        let outgoing = tokio::select! {
            update = rx.recv() => match update {
                Ok(msg) => msg,
                // A slow client only needs to know something changed.
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(%client_id, skipped, "client lagged behind");
                    ServerMessage::reload_now().to_json()
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Ping) => ServerMessage::Pong.to_json(),
                    Err(e) => {
                        tracing::debug!(%client_id, error = %e, "ignoring client message");
                        continue;
                    }
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Protocol-level ping/pong frames are answered by axum
                Some(Ok(_)) => continue,
            },
        };

        if sender.send(Message::Text(outgoing)).await.is_err() {
            break;
        }
    }

    tracing::debug!(%client_id, "websocket client disconnected");
}
