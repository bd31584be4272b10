//! WebSocket bridge between clients and the session registry. The bearer
//! credential is checked before the upgrade; an invalid or missing token
//! is a hard refusal.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use ridepool_domain::events::LiveEvent;
use ridepool_realtime::RoomId;

use crate::middleware::auth::verify_token;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/ws", get(ws_handler))
}

#[derive(Debug, Deserialize)]
struct WsParams {
    token: Option<String>,
}

/// Commands a connected client may send over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientCommand {
    JoinConversation { user_id: Uuid },
    LeaveConversation { user_id: Uuid },
    TypingStart { user_id: Uuid },
    TypingStop { user_id: Uuid },
}

async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, StatusCode> {
    // Browsers cannot set headers on WebSocket handshakes, so the token
    // may arrive as a query parameter instead.
    let token = params
        .token
        .or_else(|| {
            headers
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "))
                .map(String::from)
        })
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let user_id =
        verify_token(&state.auth.secret, &token).map_err(|_| StatusCode::UNAUTHORIZED)?;

    Ok(ws.on_upgrade(move |socket| handle_socket(state, socket, user_id)))
}

async fn handle_socket(state: AppState, socket: WebSocket, user_id: Uuid) {
    let (session_id, mut events) = state.registry.register(user_id);
    info!(%user_id, session_id = %session_id, "websocket connected");

    let (mut sink, mut stream) = socket.split();

    // Outbound: drain registry events into the socket as JSON text frames.
    let mut forward = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "failed to serialize live event");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    // Inbound: client commands until the transport closes.
    loop {
        tokio::select! {
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<ClientCommand>(&text) {
                            Ok(command) => {
                                handle_command(&state, session_id, user_id, command)
                            }
                            Err(e) => debug!(%user_id, error = %e, "ignoring malformed command"),
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong/binary ignored
                    Some(Err(_)) => break,
                }
            }
            _ = &mut forward => break,
        }
    }

    state.registry.unregister(session_id);
    forward.abort();
    info!(%user_id, session_id = %session_id, "websocket disconnected");
}

fn handle_command(
    state: &AppState,
    session_id: ridepool_realtime::SessionId,
    user_id: Uuid,
    command: ClientCommand,
) {
    match command {
        ClientCommand::JoinConversation { user_id: other } => {
            state.registry.join_room(session_id, other);
        }
        ClientCommand::LeaveConversation { user_id: other } => {
            state.registry.leave_room(session_id, other);
        }
        ClientCommand::TypingStart { user_id: other } => {
            state.registry.emit_to_room(
                RoomId::for_pair(user_id, other),
                LiveEvent::UserTyping {
                    user_id,
                    is_typing: true,
                },
                session_id,
            );
        }
        ClientCommand::TypingStop { user_id: other } => {
            state.registry.emit_to_room(
                RoomId::for_pair(user_id, other),
                LiveEvent::UserTyping {
                    user_id,
                    is_typing: false,
                },
                session_id,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_command_parsing() {
        let id = Uuid::new_v4();
        let raw = format!(r#"{{"type":"join_conversation","user_id":"{id}"}}"#);
        assert!(matches!(
            serde_json::from_str::<ClientCommand>(&raw).unwrap(),
            ClientCommand::JoinConversation { user_id } if user_id == id
        ));

        let raw = format!(r#"{{"type":"typing_start","user_id":"{id}"}}"#);
        assert!(matches!(
            serde_json::from_str::<ClientCommand>(&raw).unwrap(),
            ClientCommand::TypingStart { .. }
        ));

        assert!(serde_json::from_str::<ClientCommand>(r#"{"type":"nope"}"#).is_err());
    }
}
