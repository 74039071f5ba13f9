//! Presence Directory
//!
//! Which identities currently hold a live push connection, and how to reach
//! them. The websocket gateway is the production implementation; the
//! messaging services only see this trait.

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::chat_service::MessageDto;

/// Events pushed to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "t", content = "d")]
pub enum ChatEvent {
    /// A message was stored; sent to the sender's calling connection and the receiver.
    #[serde(rename = "RECEIVE_MESSAGE")]
    ReceiveMessage(MessageDto),

    /// The other participant read the messages in `chat_id`.
    #[serde(rename = "MESSAGES_READ")]
    MessagesRead { chat_id: Uuid },

    /// Another connection of the same identity came online.
    #[serde(rename = "USER_CONNECTED")]
    UserConnected { user_id: Uuid },

    /// Another connection of the same identity went away.
    #[serde(rename = "USER_DISCONNECTED")]
    UserDisconnected { user_id: Uuid },
}

impl ChatEvent {
    /// Dispatch name on the wire.
    pub fn event_name(&self) -> &'static str {
        match self {
            ChatEvent::ReceiveMessage(_) => "RECEIVE_MESSAGE",
            ChatEvent::MessagesRead { .. } => "MESSAGES_READ",
            ChatEvent::UserConnected { .. } => "USER_CONNECTED",
            ChatEvent::UserDisconnected { .. } => "USER_DISCONNECTED",
        }
    }

    /// Event payload without the name.
    pub fn payload(&self) -> serde_json::Value {
        match self {
            ChatEvent::ReceiveMessage(message) => {
                serde_json::to_value(message).unwrap_or_default()
            }
            ChatEvent::MessagesRead { chat_id } => serde_json::json!({ "chat_id": chat_id }),
            ChatEvent::UserConnected { user_id } | ChatEvent::UserDisconnected { user_id } => {
                serde_json::json!({ "user_id": user_id })
            }
        }
    }
}

/// One live connection: its id and the queue its writer task drains.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub session_id: Uuid,
    pub events: mpsc::UnboundedSender<ChatEvent>,
}

impl ConnectionHandle {
    pub fn new(session_id: Uuid, events: mpsc::UnboundedSender<ChatEvent>) -> Self {
        Self { session_id, events }
    }

    /// Queue an event on this connection. Returns false if it already closed.
    pub fn push(&self, event: ChatEvent) -> bool {
        self.events.send(event).is_ok()
    }
}

/// Registry of online identities.
///
/// Sending to an identity without connections is a no-op; nothing is queued
/// for later delivery.
pub trait PresenceDirectory: Send + Sync {
    /// Associate a new connection with `user_id`.
    fn register_connection(&self, user_id: Uuid, handle: ConnectionHandle);

    /// Forget a connection. Unknown sessions are ignored.
    fn unregister_connection(&self, user_id: Uuid, session_id: Uuid);

    /// Push `event` to every live connection of `user_id`. Returns how many got it.
    fn send(&self, user_id: Uuid, event: ChatEvent) -> usize;

    /// Push `event` to every live connection of `user_id` except `session_id`.
    fn send_except(&self, user_id: Uuid, session_id: Uuid, event: ChatEvent) -> usize;

    /// Whether `user_id` has at least one live connection.
    fn is_online(&self, user_id: Uuid) -> bool;
}
