//! WebSocket Message Types
//!
//! Frames are JSON text: `{"op": u8, "d": payload?, "s": seq?, "t": name?}`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::services::ChatEvent;

/// Gateway opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Server event dispatch
    Dispatch = 0,
    /// Client keep-alive
    Heartbeat = 1,
    /// Client method invocation
    Invoke = 5,
    /// A client invocation failed
    InvocationError = 8,
    /// First frame after upgrade
    Hello = 10,
    /// Heartbeat ACK
    HeartbeatAck = 11,
}

impl OpCode {
    pub fn from_u8(op: u8) -> Option<Self> {
        match op {
            0 => Some(Self::Dispatch),
            1 => Some(Self::Heartbeat),
            5 => Some(Self::Invoke),
            8 => Some(Self::InvocationError),
            10 => Some(Self::Hello),
            11 => Some(Self::HeartbeatAck),
            _ => None,
        }
    }
}

/// Incoming gateway message
#[derive(Debug, Deserialize)]
pub struct GatewayReceive {
    pub op: u8,
    pub d: Option<serde_json::Value>,
    pub s: Option<u64>,
    pub t: Option<String>,
}

/// Outgoing gateway message
#[derive(Debug, Clone, Serialize)]
pub struct GatewaySend {
    pub op: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewaySend {
    pub fn hello(heartbeat_interval: u64) -> Self {
        Self {
            op: OpCode::Hello as u8,
            d: serde_json::to_value(HelloPayload { heartbeat_interval }).ok(),
            s: None,
            t: None,
        }
    }

    pub fn heartbeat_ack() -> Self {
        Self {
            op: OpCode::HeartbeatAck as u8,
            d: None,
            s: None,
            t: None,
        }
    }

    pub fn dispatch(event: &ChatEvent, sequence: u64) -> Self {
        Self {
            op: OpCode::Dispatch as u8,
            d: Some(event.payload()),
            s: Some(sequence),
            t: Some(event.event_name().to_string()),
        }
    }

    pub fn invocation_error(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            op: OpCode::InvocationError as u8,
            d: serde_json::to_value(InvocationErrorPayload {
                method: method.into(),
                message: message.into(),
            })
            .ok(),
            s: None,
            t: None,
        }
    }
}

/// Hello payload (op 10)
#[derive(Debug, Serialize)]
pub struct HelloPayload {
    pub heartbeat_interval: u64,
}

/// Invocation error payload (op 8)
#[derive(Debug, Serialize)]
pub struct InvocationErrorPayload {
    pub method: String,
    pub message: String,
}

/// Invocable methods (op 5, `t`).
pub mod methods {
    pub const SEND_MESSAGE: &str = "SEND_MESSAGE";
    pub const MARK_MESSAGES_AS_READ: &str = "MARK_MESSAGES_AS_READ";
}

/// `SEND_MESSAGE` arguments
#[derive(Debug, Deserialize)]
pub struct SendMessageArgs {
    pub receiver_id: Uuid,
    pub text: String,
}

/// `MARK_MESSAGES_AS_READ` arguments
#[derive(Debug, Deserialize)]
pub struct MarkReadArgs {
    pub chat_id: Uuid,
}
