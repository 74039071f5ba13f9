//! WebSocket Connection Handler
//!
//! One task per connection reads client frames; a writer task owns the sink
//! and merges control frames with dispatched [`ChatEvent`]s.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Extension, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::{methods, GatewayReceive, GatewaySend, MarkReadArgs, OpCode, SendMessageArgs};
use super::session::{SessionState, Sequence};
use crate::application::services::{
    ChatError, ChatEvent, ConnectionHandle, DeliveryService, PresenceDirectory, PushCaller,
};
use crate::presentation::middleware::AuthUser;
use crate::startup::AppState;

/// Extra time past the announced heartbeat interval before a silent connection is dropped.
const HEARTBEAT_GRACE: Duration = Duration::from_secs(10);

/// WebSocket upgrade handler. The identity was resolved before the upgrade.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Response {
    ws.max_message_size(state.settings.websocket.max_message_size)
        .max_frame_size(state.settings.websocket.max_frame_size)
        .on_upgrade(move |socket| handle_socket(socket, state, auth.user_id))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState, user_id: Uuid) {
    let session_id = Uuid::new_v4();
    let mut session = SessionState::new(user_id, session_id);
    let (mut sink, mut stream) = socket.split();

    let hello = GatewaySend::hello(state.gateway.heartbeat_interval());
    if let Err(e) = send_frame(&mut sink, &hello).await {
        tracing::debug!(session_id = %session_id, error = %e, "Failed to send Hello");
        return;
    }

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ChatEvent>();
    let (control_tx, mut control_rx) = mpsc::unbounded_channel::<GatewaySend>();
    let handle = ConnectionHandle::new(session_id, event_tx);

    let mut writer = tokio::spawn(async move {
        let mut sequence = Sequence::default();
        loop {
            let frame = tokio::select! {
                Some(frame) = control_rx.recv() => frame,
                Some(event) = event_rx.recv() => GatewaySend::dispatch(&event, sequence.next()),
                else => break,
            };
            if let Err(e) = send_frame(&mut sink, &frame).await {
                tracing::debug!(error = %e, "Socket write failed");
                break;
            }
        }
    });

    let gateway = state.gateway.clone();
    gateway.register_connection(user_id, handle.clone());
    gateway.send_except(user_id, session_id, ChatEvent::UserConnected { user_id });

    let delivery = state.delivery_service();
    let caller = PushCaller {
        user_id,
        connection: handle,
    };

    let heartbeat_timeout = Duration::from_millis(gateway.heartbeat_interval()) + HEARTBEAT_GRACE;

    tracing::info!(user_id = %user_id, session_id = %session_id, "Push connection opened");

    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_frame(text.as_str(), &mut session, &delivery, &caller).await {
                            if control_tx.send(reply).is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(session_id = %session_id, "Connection closed");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(session_id = %session_id, error = %e, "WebSocket error");
                        break;
                    }
                    // Pings are answered by axum; binary frames are not part of the protocol.
                    Some(Ok(_)) => {}
                }
            }

            _ = &mut writer => {
                tracing::debug!(session_id = %session_id, "Writer stopped");
                break;
            }

            _ = tokio::time::sleep_until(session.idle_deadline(heartbeat_timeout)) => {
                tracing::info!(session_id = %session_id, "Heartbeat timeout, closing connection");
                break;
            }
        }
    }

    gateway.unregister_connection(user_id, session_id);
    gateway.send(user_id, ChatEvent::UserDisconnected { user_id });
    writer.abort();

    tracing::info!(user_id = %user_id, session_id = %session_id, "Push connection closed");
}

async fn send_frame<S>(sink: &mut S, frame: &GatewaySend) -> Result<(), String>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    let text = serde_json::to_string(frame).map_err(|e| e.to_string())?;
    sink.send(Message::Text(text.into()))
        .await
        .map_err(|e| e.to_string())
}

/// Handle one client frame. Returns the frame to send back, if any.
async fn handle_frame(
    text: &str,
    session: &mut SessionState,
    delivery: &DeliveryService,
    caller: &PushCaller,
) -> Option<GatewaySend> {
    let frame: GatewayReceive = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(session_id = %session.session_id, error = %e, "Unparseable frame");
            return None;
        }
    };

    match OpCode::from_u8(frame.op) {
        Some(OpCode::Heartbeat) => {
            session.heartbeat();
            tracing::trace!(session_id = %session.session_id, "Heartbeat received");
            Some(GatewaySend::heartbeat_ack())
        }
        Some(OpCode::Invoke) => {
            // Any client traffic proves liveness.
            session.heartbeat();
            let method = frame.t.unwrap_or_default();
            invoke(delivery, caller, &method, frame.d.unwrap_or_default())
                .await
                .err()
        }
        _ => {
            tracing::debug!(session_id = %session.session_id, op = frame.op, "Ignoring opcode");
            None
        }
    }
}

/// Run an invocation. A failure becomes an `INVOCATION_ERROR` frame.
async fn invoke(
    delivery: &DeliveryService,
    caller: &PushCaller,
    method: &str,
    args: serde_json::Value,
) -> Result<(), GatewaySend> {
    let fail = |message: String| GatewaySend::invocation_error(method, message);

    match method {
        methods::SEND_MESSAGE => {
            let args: SendMessageArgs = parse_args(args).map_err(fail)?;
            delivery
                .send_message(caller, args.receiver_id, &args.text)
                .await
                .map_err(|e| fail(client_message(method, e)))?;
        }
        methods::MARK_MESSAGES_AS_READ => {
            let args: MarkReadArgs = parse_args(args).map_err(fail)?;
            delivery
                .mark_messages_as_read(caller, args.chat_id)
                .await
                .map_err(|e| fail(client_message(method, e)))?;
        }
        _ => return Err(fail(format!("Unknown method '{}'", method))),
    }

    Ok(())
}

fn parse_args<T: DeserializeOwned>(args: serde_json::Value) -> Result<T, String> {
    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))
}

/// Storage failures are logged in full and reported generically.
fn client_message(method: &str, error: ChatError) -> String {
    match error {
        ChatError::Storage(detail) => {
            tracing::error!(method, error = %detail, "Invocation failed");
            "Internal server error".to_string()
        }
        other => other.to_string(),
    }
}
