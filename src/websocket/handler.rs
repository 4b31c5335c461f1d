//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and manages the connection lifecycle.
//! Each socket gets one hub connection: a writer task drains its outbox into
//! the socket, and a reader task handles client frames.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;

use super::messages::{ClientMessage, ServerEvent};
use crate::api::AppState;
use crate::hub::{Hub, Outbox, Payload, PayloadExt, UserId};

/// Identity of the connecting user. Authentication happens upstream; the
/// hub trusts the id it is given.
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub user_id: UserId,
}

/// Settings the reader needs once the socket is upgraded
#[derive(Debug, Clone, Copy)]
struct ReaderLimits {
    max_relay_recipients: usize,
}

/// WebSocket upgrade handler
///
/// This is the entry point for WebSocket connections.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hub = state.hub.clone();
    let ws_config = &state.config.websocket;
    let limits = ReaderLimits {
        max_relay_recipients: ws_config.max_relay_recipients,
    };

    ws.max_message_size(ws_config.max_message_size)
        .write_buffer_size(ws_config.write_buffer_size)
        .on_upgrade(move |socket| handle_socket(socket, hub, params.user_id, limits))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, hub: Hub, user_id: UserId, limits: ReaderLimits) {
    let (mut sender, mut receiver) = socket.split();

    let (handle, outbox) = hub.connect(user_id);
    let connection_id = handle.id();

    if let Err(e) = hub.register(handle).await {
        tracing::error!(user_id, error = %e, "Failed to register WebSocket connection");
        let _ = sender.send(Message::Close(None)).await;
        return;
    }

    // Task to forward payloads from the outbox to the WebSocket
    let mut send_task = tokio::spawn(async move {
        drain_outbox(outbox, &mut sender).await;
        // Outbox closed by the hub (replaced or evicted) or the socket failed
        let _ = sender.send(Message::Close(None)).await;
    });

    let hub_for_recv = hub.clone();

    // Task to receive messages from WebSocket and handle them
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_ws_message(&hub_for_recv, user_id, limits, msg).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(user_id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    // A no-op if the hub already replaced or evicted this connection
    if let Err(e) = hub.unregister(user_id, connection_id).await {
        tracing::warn!(user_id, error = %e, "Failed to unregister WebSocket connection");
    }
}

async fn drain_outbox(mut outbox: Outbox, sender: &mut SplitSink<WebSocket, Message>) {
    while let Some(payload) = outbox.recv().await {
        if sender.send(to_frame(&payload)).await.is_err() {
            tracing::debug!(
                user_id = outbox.user_id(),
                connection_id = %outbox.id(),
                "WebSocket send failed, closing connection"
            );
            break;
        }
    }
}

/// UTF-8 payloads go out as text frames, anything else as binary
fn to_frame(payload: &Payload) -> Message {
    match payload.as_text() {
        Some(text) => Message::Text(text.to_string()),
        None => Message::Binary(payload.to_vec()),
    }
}

/// Handle a received WebSocket message
///
/// Returns false if the connection should be closed.
async fn handle_ws_message(
    hub: &Hub,
    user_id: UserId,
    limits: ReaderLimits,
    message: Message,
) -> bool {
    match message {
        Message::Text(text) => {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => {
                    handle_client_message(hub, user_id, limits, client_msg).await;
                }
                Err(e) => {
                    tracing::debug!(user_id, error = %e, "Invalid client message");
                    // Send error but keep connection open
                    reply(hub, user_id, ServerEvent::error(format!("Invalid message format: {}", e)))
                        .await;
                }
            }
            true
        }
        Message::Binary(_) => {
            reply(hub, user_id, ServerEvent::error("Binary messages not supported")).await;
            true
        }
        // Axum answers pings itself
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(user_id, "Client requested close");
            false
        }
    }
}

/// Handle a parsed client message
async fn handle_client_message(
    hub: &Hub,
    user_id: UserId,
    limits: ReaderLimits,
    message: ClientMessage,
) {
    let relay = match message.into_relay(user_id) {
        Some(relay) => relay,
        None => {
            reply(hub, user_id, ServerEvent::pong()).await;
            return;
        }
    };

    if relay.recipients.len() > limits.max_relay_recipients {
        let error = ServerEvent::error(format!(
            "Too many recipients: {} (max {})",
            relay.recipients.len(),
            limits.max_relay_recipients
        ));
        reply(hub, user_id, error).await;
        return;
    }

    let kind = relay.event.kind();
    if let Err(e) = hub.deliver_json(relay.recipients, kind, &relay.event).await {
        tracing::error!(user_id, kind, error = %e, "Failed to relay client event");
    }
}

/// Send an event to whichever connection is currently registered for
/// `user_id`. That may not be the socket the triggering frame arrived on:
/// under the reject policy the newcomer never registers, and after a
/// replacement the newer socket receives it.
async fn reply(hub: &Hub, user_id: UserId, event: ServerEvent) {
    if let Err(e) = hub.send_json(user_id, event.kind(), &event).await {
        tracing::error!(user_id, error = %e, "Failed to queue reply");
    }
}
