//! WebSocket Gateway
//!
//! Registry of live push connections, keyed by session and by identity.

use dashmap::DashMap;
use uuid::Uuid;

use crate::application::services::{ChatEvent, ConnectionHandle, PresenceDirectory};
use crate::infrastructure::metrics;

/// Default heartbeat interval announced in HELLO, in milliseconds.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 41250;

/// Connected session
struct ConnectedSession {
    user_id: Uuid,
    handle: ConnectionHandle,
}

/// WebSocket gateway managing all connections
pub struct Gateway {
    /// Active sessions by session_id
    sessions: DashMap<Uuid, ConnectedSession>,
    /// User ID to session IDs (one user can have several connections)
    user_sessions: DashMap<Uuid, Vec<Uuid>>,
    heartbeat_interval_ms: u64,
}

impl Gateway {
    pub fn new() -> Self {
        Self::with_heartbeat_interval(DEFAULT_HEARTBEAT_INTERVAL_MS)
    }

    pub fn with_heartbeat_interval(heartbeat_interval_ms: u64) -> Self {
        Self {
            sessions: DashMap::new(),
            user_sessions: DashMap::new(),
            heartbeat_interval_ms,
        }
    }

    pub fn heartbeat_interval(&self) -> u64 {
        self.heartbeat_interval_ms
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of distinct identities with at least one connection.
    pub fn online_user_count(&self) -> usize {
        self.user_sessions.len()
    }

    fn handles_of(&self, user_id: Uuid) -> Vec<ConnectionHandle> {
        // Collect first so no map guard is held while pushing.
        self.user_sessions
            .get(&user_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.sessions.get(id).map(|s| s.handle.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceDirectory for Gateway {
    fn register_connection(&self, user_id: Uuid, handle: ConnectionHandle) {
        let session_id = handle.session_id;
        self.sessions
            .insert(session_id, ConnectedSession { user_id, handle });
        self.user_sessions
            .entry(user_id)
            .or_default()
            .push(session_id);
        metrics::gateway_connection_opened();

        tracing::info!(user_id = %user_id, session_id = %session_id, "Session registered");
    }

    fn unregister_connection(&self, user_id: Uuid, session_id: Uuid) {
        let Some((_, session)) = self.sessions.remove(&session_id) else {
            return;
        };
        if session.user_id != user_id {
            tracing::warn!(
                user_id = %user_id,
                owner_id = %session.user_id,
                session_id = %session_id,
                "Session unregistered under a different identity"
            );
        }

        self.user_sessions
            .remove_if_mut(&session.user_id, |_, ids| {
                ids.retain(|id| *id != session_id);
                ids.is_empty()
            });
        metrics::gateway_connection_closed();

        tracing::info!(user_id = %session.user_id, session_id = %session_id, "Session unregistered");
    }

    fn send(&self, user_id: Uuid, event: ChatEvent) -> usize {
        self.handles_of(user_id)
            .into_iter()
            .filter(|handle| handle.push(event.clone()))
            .count()
    }

    fn send_except(&self, user_id: Uuid, session_id: Uuid, event: ChatEvent) -> usize {
        self.handles_of(user_id)
            .into_iter()
            .filter(|handle| handle.session_id != session_id)
            .filter(|handle| handle.push(event.clone()))
            .count()
    }

    fn is_online(&self, user_id: Uuid) -> bool {
        self.user_sessions
            .get(&user_id)
            .map(|ids| !ids.is_empty())
            .unwrap_or(false)
    }
}

/// A fresh connection handle and the receiving end of its queue.
#[cfg(test)]
pub fn test_connection() -> (ConnectionHandle, tokio::sync::mpsc::UnboundedReceiver<ChatEvent>) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    (ConnectionHandle::new(Uuid::new_v4(), tx), rx)
}
