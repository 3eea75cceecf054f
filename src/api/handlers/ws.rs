use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use uuid::Uuid;

use crate::alerts::{Connection, SubscriptionRegistry};
use crate::api::ws_types::{ClientMessage, ServerMessage};
use crate::AppState;

pub async fn handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state.registry))
}

async fn handle_socket(socket: WebSocket, registry: Arc<SubscriptionRegistry>) {
    let connection_id = Uuid::new_v4();
    let conn = registry.connect(connection_id);
    let (mut sender, mut receiver) = socket.split();
    registry.activate(connection_id);

    tracing::info!(connection_id = %connection_id, "Subscriber connected");

    // Delivery loop: drains this connection's queue only, so a stalled write
    // here never holds up any other subscriber.
    let writer_conn = conn.clone();
    let mut writer = tokio::spawn(async move {
        while let Some(msg) = writer_conn.next_message().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize ServerMessage");
                }
            }
        }
        let _ = sender.close().await;
    });

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => handle_text(&registry, &conn, &text),
                    // Protocol-level ping/pong also count as signs of life.
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        registry.heartbeat(connection_id);
                    }
                    Some(Ok(Message::Binary(_))) => {
                        conn.send(ServerMessage::Error {
                            message: "binary frames are not supported".into(),
                        });
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket read failed");
                        break;
                    }
                }
            }
            // Writer ends when the socket write fails or the registry closed
            // this connection (heartbeat timeout).
            _ = &mut writer => break,
        }
    }

    registry.unsubscribe(connection_id);
    writer.abort();

    tracing::info!(
        connection_id = %connection_id,
        dropped_count = conn.dropped_count(),
        "Subscriber disconnected"
    );
}

fn handle_text(registry: &SubscriptionRegistry, conn: &Connection, text: &str) {
    let connection_id = conn.id();
    match ClientMessage::parse(text) {
        Ok(ClientMessage::Watch { watch, since_seq }) => {
            registry.heartbeat(connection_id);
            let conn = registry.subscribe(connection_id, watch);
            registry.ack(connection_id, conn.watch_set());
            if let Some(since_seq) = since_seq {
                let replayed = registry.replay_since(connection_id, since_seq);
                tracing::debug!(connection_id = %connection_id, since_seq, replayed, "Replayed retained alerts");
            }
        }
        Ok(ClientMessage::Ping) => {
            registry.heartbeat(connection_id);
            conn.send(ServerMessage::Pong);
        }
        Ok(ClientMessage::Pong) => {
            registry.heartbeat(connection_id);
        }
        Err(message) => {
            tracing::debug!(connection_id = %connection_id, error = %message, "Unparseable client message");
            conn.send(ServerMessage::Error { message });
        }
    }
}
