//! WebSocket Connection Handler
//!
//! Connection lifecycle:
//!
//! ```text
//! upgrade (?token=...) -> register with hub -> verify token -> presence row
//!   -> read loop: "messages" frames go through the fan-out
//!   -> close: presence row removed, hub entry dropped
//! ```
//!
//! A connection whose token fails verification stays open but
//! unauthenticated: nothing is registered and every inbound event is
//! answered with an `exception`.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::{
    parse_frame, ConnectedPayload, GatewayError, InboundMessage, CONNECTED_EVENT, MESSAGES_EVENT,
};
use super::session::SessionState;
use crate::domain::ports::PushEvent;
use crate::startup::AppState;

/// Connection query parameters
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub token: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Response {
    let limits = &state.settings.websocket;
    ws.max_message_size(limits.max_message_size)
        .max_frame_size(limits.max_frame_size)
        .on_upgrade(move |socket| handle_socket(socket, state, params.token))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState, token: Option<String>) {
    let connection_id = Uuid::new_v4().to_string();
    let mut session = SessionState::new(connection_id.clone());

    tracing::debug!(connection_id = %connection_id, "New WebSocket connection");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<PushEvent>();
    state.hub.register(&connection_id, tx.clone());

    // Forward queued events to the socket
    let sender_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!("Failed to serialize event: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    match authenticate_connection(&state, &connection_id, token.as_deref()).await {
        Ok(user_id) => {
            session.authenticate(user_id);
            let payload = ConnectedPayload {
                connection_id: connection_id.clone(),
                user_id,
            };
            let _ = tx.send(PushEvent::new(
                CONNECTED_EVENT,
                serde_json::to_value(payload).unwrap_or_default(),
            ));
        }
        Err(e) => {
            tracing::debug!(connection_id = %connection_id, error = %e, "Unauthenticated connection");
            let _ = tx.send(e.to_event());
        }
    }

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                session.frame_received();
                if let Err(e) = handle_frame(&state, &session, text.as_str()).await {
                    tracing::debug!(
                        connection_id = %connection_id,
                        error = %e,
                        "Inbound event rejected"
                    );
                    let _ = tx.send(e.to_event());
                }
            }
            Ok(Message::Close(_)) => {
                tracing::debug!(connection_id = %connection_id, "Connection closed");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    disconnect(&state, &session).await;
    sender_task.abort();
}

/// Verify the connection token and record presence.
///
/// Returns the authenticated user id.
pub async fn authenticate_connection(
    state: &AppState,
    connection_id: &str,
    token: Option<&str>,
) -> Result<i64, GatewayError> {
    let token = token
        .filter(|t| !t.is_empty())
        .ok_or(GatewayError::Unauthorized)?;

    let user = state
        .auth
        .get_current_user(token)
        .await
        .map_err(|_| GatewayError::Unauthorized)?;

    state
        .presence
        .register_connection(user.id, connection_id)
        .await
        .map_err(|e| {
            tracing::warn!(connection_id, error = %e, "Failed to record presence");
            GatewayError::Unauthorized
        })?;
    state.hub.authenticate(connection_id, user.id);

    tracing::info!(user_id = user.id, connection_id, "User connected");
    Ok(user.id)
}

/// Dispatch one inbound text frame
pub async fn handle_frame(
    state: &AppState,
    session: &SessionState,
    text: &str,
) -> Result<(), GatewayError> {
    let frame = parse_frame(text)?;

    match frame.event.as_str() {
        MESSAGES_EVENT => {
            let user_id = session.user_id.ok_or(GatewayError::Unauthorized)?;
            let payload: InboundMessage = serde_json::from_value(frame.data)
                .map_err(|e| GatewayError::InvalidFrame(e.to_string()))?;
            if payload.user_id != user_id {
                return Err(GatewayError::SenderMismatch);
            }

            state
                .fanout
                .handle_inbound_message(
                    &session.connection_id,
                    user_id,
                    payload.conversation_id,
                    &payload.message,
                )
                .await?;
            Ok(())
        }
        _ if !session.is_authenticated() => Err(GatewayError::Unauthorized),
        other => Err(GatewayError::UnknownEvent(other.to_string())),
    }
}

/// Drop presence and hub state for a closed connection
pub async fn disconnect(state: &AppState, session: &SessionState) {
    if let Some(user_id) = session.user_id {
        match state
            .presence
            .remove_connection(user_id, &session.connection_id)
            .await
        {
            Ok(removed) => tracing::info!(
                user_id,
                connection_id = %session.connection_id,
                removed,
                "User disconnected"
            ),
            Err(e) => tracing::warn!(
                connection_id = %session.connection_id,
                error = %e,
                "Failed to remove presence"
            ),
        }
    }
    state.hub.unregister(&session.connection_id);
}
