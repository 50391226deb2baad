use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::logic::relay_command;
use crate::state::AppState;

/// Every envelope recorded since the last clear, oldest first.
pub async fn history_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.storage.entries().await {
        Ok(entries) => Json(entries).into_response(),
        Err(err) => {
            error!("history read failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut socket_sender, mut socket_receiver) = socket.split();
    let mut updates = state.updates.subscribe();
    let connection_id = Uuid::new_v4();
    info!(%connection_id, peers = state.updates.receiver_count(), "WS connected");

    let send_task = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(payload) => {
                    if socket_sender.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%connection_id, skipped, "WS peer lagging, updates dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut close_frame = None;

    while let Some(Ok(message)) = socket_receiver.next().await {
        match message {
            Message::Text(text) => {
                if relay_command(&state, &text).await.is_none() {
                    warn!(%connection_id, "WS rejected command {text:?}");
                }
            }
            Message::Close(frame) => {
                close_frame = frame;
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
    match close_frame {
        Some(frame) => info!(
            %connection_id,
            code = frame.code,
            reason = %frame.reason,
            "WS disconnected"
        ),
        None => info!(%connection_id, "WS disconnected"),
    }
}
