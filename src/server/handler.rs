//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use crate::protocol::ClientEvent;
use crate::relay::ConnectionId;

use super::state::AppState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Spawns a task that receives messages from the rx channel and pushes
/// them to the WebSocket sender.
///
/// This is the only place a connection's outbound traffic touches the
/// network: the relay engine queues onto the channel and this task
/// drains it, so one slow socket never blocks fan-out to anyone else.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            // Send the message to this client
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, mut receiver) = socket.split();

    // Create the outbound delivery channel and register the connection
    let (tx, rx) = mpsc::unbounded_channel();
    let connection_id = state.session.connect(tx).await;

    let mut send_task = pusher_loop(rx, sender);

    // Receive and dispatch this connection's inbound events
    let session = state.session.clone();
    let event_connection_id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::error!("WebSocket error on '{}': {}", event_connection_id, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    dispatch_text(&session, &event_connection_id, &text).await;
                }
                Message::Ping(_) => {
                    tracing::debug!("received ping from '{}'", event_connection_id);
                    // Ping/pong is handled automatically by the WebSocket protocol
                }
                Message::Close(_) => {
                    tracing::info!("connection '{}' requested close", event_connection_id);
                    break;
                }
                _ => {}
            }
        }
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    // Transport-level disconnect: purge from every room and unregister
    state.session.disconnect(&connection_id).await;
}

/// Parse one inbound frame and hand it to the session manager.
/// Undeserializable frames are dropped with a warning, never an error
/// back to the client.
async fn dispatch_text(
    session: &crate::relay::SessionManager,
    connection_id: &ConnectionId,
    text: &str,
) {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => session.handle_event(connection_id, event).await,
        Err(e) => {
            tracing::warn!("dropping malformed frame from '{}': {}", connection_id, e);
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}
