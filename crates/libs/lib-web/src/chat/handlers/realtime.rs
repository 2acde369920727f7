//! # Real-time Websocket Handler
//!
//! `GET /ws?token=<jwt>` upgrades to a websocket registered with the
//! [`BroadcastHub`] for the token's user.
//!
//! Server frames:
//!
//! ```json
//! { "type": "message", "data": { "id": 1, "text": "Hi", "sender": "user", "timestamp": "..." } }
//! { "type": "receiveMessage", "payload": <any> }
//! ```
//!
//! Client frames `{ "type": "sendMessage", "payload": <any> }` are relayed as
//! `receiveMessage` to the same user's connections. Anything else is ignored.
//!
//! ```javascript
//! const ws = new WebSocket(`ws://localhost:3001/ws?token=${token}`);
//! ws.onmessage = (event) => console.log(JSON.parse(event.data));
//! ```

use crate::chat::hub::{Audience, BroadcastHub, PublishReport, PEER_WRITE_TIMEOUT};
use crate::chat::{ChatError, ChatOrchestrator};
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use lib_auth::AuthError;
use lib_core::dto::{ClientFrame, RealtimeEvent};
use lib_core::UserId;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// Authenticate from the query string, then upgrade.
///
/// The token is checked before the upgrade so an unauthenticated caller gets a
/// plain `401` rather than a socket.
pub async fn chat_websocket(
    State(chat): State<Arc<ChatOrchestrator>>,
    Query(params): Query<WsParams>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let token = params
        .token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty());

    let user_id = match token {
        Some(token) => chat.authorize_token(token),
        None => Err(ChatError::Unauthorized(AuthError::MissingCredential)),
    };
    let user_id = match user_id {
        Ok(user_id) => user_id,
        Err(e) => {
            warn!("[WS] Connection rejected: {}", e);
            return e.into_response();
        }
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            warn!(user_id, "[WS] Upgrade failed: {}", rejection);
            return rejection.into_response();
        }
    };

    let hub = chat.hub().clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub, user_id))
}

/// Relay a client text frame to the sender's own connections.
///
/// Returns `None` for frames that are not a valid `sendMessage`.
pub async fn relay_client_frame(hub: &BroadcastHub, user_id: UserId, text: &str) -> Option<PublishReport> {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(ClientFrame::SendMessage { payload }) => Some(
            hub.publish(Audience::User(user_id), RealtimeEvent::ReceiveMessage { payload })
                .await,
        ),
        Err(e) => {
            debug!(user_id, "[WS] Ignoring unrecognised frame: {}", e);
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, hub: Arc<BroadcastHub>, user_id: UserId) {
    let connection_start = Instant::now();
    let mut subscription = hub.register(Some(user_id)).await;
    let connection_id = subscription.id();
    let (mut sender, mut receiver) = socket.split();

    info!(connection_id = %connection_id, user_id, "[WS] CONNECTED");

    // Drains this connection's hub queue onto the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    error!(connection_id = %connection_id, "[WS] SERIALIZE_ERROR {}", e);
                    continue;
                }
            };

            match tokio::time::timeout(PEER_WRITE_TIMEOUT, sender.send(Message::Text(json.into()))).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(connection_id = %connection_id, "[WS] SEND_ERROR {}", e);
                    break;
                }
                Err(_) => {
                    warn!(connection_id = %connection_id, "[WS] SEND_TIMEOUT, disconnecting slow peer");
                    break;
                }
            }
        }
    });

    let relay_hub = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    relay_client_frame(&relay_hub, user_id, text.as_str()).await;
                }
                Ok(Message::Close(_)) => {
                    debug!(connection_id = %connection_id, "[WS] CLOSE_RECEIVED");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(connection_id = %connection_id, "[WS] RECV_ERROR {}", e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.unregister(connection_id).await;

    info!(
        connection_id = %connection_id,
        user_id,
        duration_ms = connection_start.elapsed().as_millis(),
        "[WS] DISCONNECTED"
    );
}
