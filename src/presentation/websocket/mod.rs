//! WebSocket Gateway
//!
//! Push channel: live delivery of messages, read receipts and presence.

pub mod gateway;
pub mod handler;
pub mod messages;
pub mod session;

pub use gateway::Gateway;
pub use handler::ws_handler;
pub use messages::{GatewayReceive, GatewaySend, OpCode};
pub use session::SessionState;
