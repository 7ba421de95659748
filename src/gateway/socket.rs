//! WebSocket connection lifecycle
//!
//! Each socket gets a fresh [`ConnectionId`] and an outbound queue in the
//! registry. A writer task drains the queue onto the socket while inbound
//! text frames are handed to the relay one at a time, so a connection never
//! runs two turns concurrently.

use crate::domain::ConnectionId;
use crate::gateway::GatewayState;
use crate::infrastructure::log_messages::gateway as log_msg;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tracing::{debug, info, warn};

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> Response {
    ws.on_upgrade(move |socket: WebSocket| async move {
        let (writer, reader) = socket.split();
        serve_connection(state, reader, writer).await;
    })
}

/// Drive one connection until the client closes or the socket fails
pub async fn serve_connection<R, W>(state: GatewayState, mut reader: R, mut writer: W)
where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
    W: Sink<Message> + Unpin + Send + 'static,
    W::Error: std::fmt::Display,
{
    let connection_id = ConnectionId::generate();
    let capacity = state.outbound_capacity;
    let mut outbound = state.registry.register(connection_id.clone(), capacity);
    info!(connection_id = %connection_id, "{}", log_msg::CONNECTION_OPENED);

    let writer_id = connection_id.clone();
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match message.to_json() {
                Ok(text) => text,
                Err(e) => {
                    warn!(
                        connection_id = %writer_id,
                        error = %e,
                        "dropping unserializable message"
                    );
                    continue;
                }
            };
            if let Err(e) = writer.send(Message::Text(text.into())).await {
                warn!(connection_id = %writer_id, error = %e, "{}", log_msg::SOCKET_WRITE_FAILED);
                break;
            }
        }
        let _ = writer.close().await;
    });

    while let Some(frame) = reader.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                state
                    .relay
                    .handle_frame(connection_id.clone(), text.as_str())
                    .await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => debug!(connection_id = %connection_id, "ignoring non-text frame"),
            Err(e) => {
                debug!(connection_id = %connection_id, error = %e, "socket read failed");
                break;
            }
        }
    }

    // Dropping the registry's sender lets the writer drain what is queued and stop.
    state.registry.unregister(&connection_id);
    if let Err(e) = writer_task.await {
        warn!(connection_id = %connection_id, error = %e, "writer task failed");
    }
    info!(connection_id = %connection_id, "{}", log_msg::CONNECTION_CLOSED);
}
