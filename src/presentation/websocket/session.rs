//! WebSocket Session Management

use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

/// Per-connection state owned by the reader loop.
#[derive(Debug)]
pub struct SessionState {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub last_heartbeat: Instant,
}

impl SessionState {
    pub fn new(user_id: Uuid, session_id: Uuid) -> Self {
        Self {
            user_id,
            session_id,
            last_heartbeat: Instant::now(),
        }
    }

    pub fn heartbeat(&mut self) {
        self.last_heartbeat = Instant::now();
    }

    /// When the connection counts as idle unless another frame arrives.
    pub fn idle_deadline(&self, timeout: Duration) -> Instant {
        self.last_heartbeat + timeout
    }
}

/// Dispatch sequence, owned by the writer task.
#[derive(Debug, Default)]
pub struct Sequence(u64);

impl Sequence {
    pub fn next(&mut self) -> u64 {
        self.0 += 1;
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_starts_at_one() {
        let mut seq = Sequence::default();
        assert_eq!(seq.next(), 1);
        assert_eq!(seq.next(), 2);
    }

    #[tokio::test]
    async fn test_fresh_session_deadline_is_ahead() {
        let state = SessionState::new(Uuid::new_v4(), Uuid::new_v4());
        assert!(state.idle_deadline(Duration::from_secs(1)) > Instant::now());
        assert!(state.idle_deadline(Duration::ZERO) <= Instant::now());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_deadline_follows_last_heartbeat() {
        let timeout = Duration::from_secs(55);
        let mut state = SessionState::new(Uuid::new_v4(), Uuid::new_v4());

        tokio::time::advance(Duration::from_secs(1)).await;
        state.heartbeat();
        let start = Instant::now();

        tokio::time::advance(Duration::from_secs(54)).await;
        assert!(state.idle_deadline(timeout) > Instant::now());

        tokio::time::sleep_until(state.idle_deadline(timeout)).await;
        assert_eq!(start.elapsed(), timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_pushes_deadline_back() {
        let timeout = Duration::from_secs(10);
        let mut state = SessionState::new(Uuid::new_v4(), Uuid::new_v4());
        let first = state.idle_deadline(timeout);

        tokio::time::advance(Duration::from_secs(7)).await;
        state.heartbeat();

        assert_eq!(state.idle_deadline(timeout) - first, Duration::from_secs(7));
    }
}
