use std::sync::Arc;
use axum::{
    extract::{Query, State, ws::{Message, WebSocket, WebSocketUpgrade}},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc::unbounded_channel;
use tracing::{debug, error, info, warn};

use crate::AppState;
use crate::clients::UserIdentity;
use crate::models::{ClientMessage, ServerMessage};
use crate::services::auth_service::get_auth_token;
use crate::ws::gateway::{AuthOutcome, Gateway};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// WebSocket handler. The connection is authenticated before the upgrade;
/// a rejected handshake never reaches the message loop.
pub async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    info!("New WebSocket connection attempt");
    let token = params.token.or_else(|| get_auth_token(&headers).ok());

    match state.gateway.authenticate(token.as_deref()).await {
        AuthOutcome::Authenticated(user) => {
            let gateway = state.gateway.clone();
            ws.on_upgrade(move |socket| handle_socket(socket, gateway, user))
        }
        AuthOutcome::Rejected(reason) => (StatusCode::UNAUTHORIZED, reason).into_response(),
    }
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, gateway: Arc<Gateway>, user: UserIdentity) {
    let (outbox, mut inbox) = unbounded_channel::<ServerMessage>();
    let mut session = gateway.open_session(user, outbox);
    info!("WebSocket connection established with session_id: {}", session.id);

    let (mut sender, mut receiver) = socket.split();

    // Everything addressed to this session, direct replies and room fan-out alike, leaves through here
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = inbox.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize outgoing message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => gateway.dispatch(&mut session, msg).await,
                    Err(e) => {
                        warn!("Failed to parse message from session {}: {}", session.id, e);
                        session.send(ServerMessage::error("Invalid message"));
                    }
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => debug!("Ignoring non-text frame from session {}", session.id),
                Some(Err(e)) => {
                    warn!("WebSocket error on session {}: {}", session.id, e);
                    break;
                }
            },
            _ = &mut send_task => break,
        }
    }

    send_task.abort();
    gateway.close_session(session);
    info!("WebSocket connection terminated");
}
