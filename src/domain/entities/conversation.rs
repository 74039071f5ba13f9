//! Conversation entity and repository trait.
//!
//! Maps to the `chats` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Unordered pair of distinct participants.
///
/// `(a, b)` and `(b, a)` compare equal and hash the same, which is what the
/// "one conversation per pair" rule is keyed on. The order the pair was built
/// in is kept so a new conversation records who initiated it as `user1`.
#[derive(Debug, Clone, Copy)]
pub struct ParticipantPair {
    first: Uuid,
    second: Uuid,
}

impl ParticipantPair {
    /// Build a pair, or `None` when both sides are the same identity.
    pub fn new(first: Uuid, second: Uuid) -> Option<Self> {
        if first == second {
            None
        } else {
            Some(Self { first, second })
        }
    }

    pub fn first(&self) -> Uuid {
        self.first
    }

    pub fn second(&self) -> Uuid {
        self.second
    }

    /// Canonical `(low, high)` ordering, matching the storage uniqueness index.
    pub fn ordered(&self) -> (Uuid, Uuid) {
        if self.first < self.second {
            (self.first, self.second)
        } else {
            (self.second, self.first)
        }
    }
}

impl PartialEq for ParticipantPair {
    fn eq(&self, other: &Self) -> bool {
        self.ordered() == other.ordered()
    }
}

impl Eq for ParticipantPair {}

impl std::hash::Hash for ParticipantPair {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.ordered().hash(state);
    }
}

/// A two-party conversation.
///
/// Maps to the `chats` table:
/// - id: UUID PRIMARY KEY
/// - user1_id: UUID NOT NULL (initiator)
/// - user2_id: UUID NOT NULL
/// - created_at: TIMESTAMPTZ NOT NULL
///
/// Unique on `(LEAST(user1_id, user2_id), GREATEST(user1_id, user2_id))`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Start a new conversation for `pair`, stamped now.
    pub fn start(pair: ParticipantPair) -> Self {
        Self {
            id: Uuid::new_v4(),
            user1_id: pair.first(),
            user2_id: pair.second(),
            created_at: Utc::now(),
        }
    }

    pub fn pair(&self) -> ParticipantPair {
        ParticipantPair {
            first: self.user1_id,
            second: self.user2_id,
        }
    }

    /// Whether `user_id` is one of the two participants.
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }

    /// The participant that is not `user_id`.
    ///
    /// Returns `None` when `user_id` is not part of this conversation.
    pub fn other_participant(&self, user_id: Uuid) -> Option<Uuid> {
        if self.user1_id == user_id {
            Some(self.user2_id)
        } else if self.user2_id == user_id {
            Some(self.user1_id)
        } else {
            None
        }
    }
}

/// Repository trait for Conversation data access operations.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Find a conversation by id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>, AppError>;

    /// Find the conversation for an unordered participant pair.
    async fn find_by_pair(&self, pair: ParticipantPair) -> Result<Option<Conversation>, AppError>;

    /// All conversations `user_id` takes part in, oldest first.
    async fn find_for_participant(&self, user_id: Uuid) -> Result<Vec<Conversation>, AppError>;

    /// Insert a new conversation.
    ///
    /// Fails with `AppError::Conflict` when the pair already has one.
    async fn insert(&self, conversation: &Conversation) -> Result<Conversation, AppError>;

    /// Return the pair's conversation, creating it if there is none.
    ///
    /// Must never leave two conversations for one pair, even when called
    /// concurrently from different connections.
    async fn find_or_create(&self, pair: ParticipantPair) -> Result<Conversation, AppError>;

    /// Cheap round trip used by the readiness probe.
    async fn ping(&self) -> Result<(), AppError>;
}
