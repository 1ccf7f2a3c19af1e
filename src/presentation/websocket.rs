// WebSocket observer endpoint: one JSON text frame per notification
use crate::application::broadcaster::{Broadcaster, Subscription};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;

pub async fn telemetry_socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let broadcaster = state.broadcaster.clone();
    ws.on_upgrade(move |socket| forward_notifications(socket, broadcaster))
}

async fn forward_notifications(socket: WebSocket, broadcaster: Arc<Broadcaster>) {
    let Subscription { id, mut receiver } = broadcaster.subscribe();
    tracing::debug!(observers = broadcaster.observer_count(), "websocket observer connected");
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            notification = receiver.recv() => {
                let Some(notification) = notification else { break };
                let text = match serde_json::to_string(&notification) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to encode notification");
                        continue;
                    }
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => match incoming {
                // Observers only listen; anything else they send is ignored
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    broadcaster.unsubscribe(id);
    tracing::debug!(observers = broadcaster.observer_count(), "websocket observer disconnected");
}
