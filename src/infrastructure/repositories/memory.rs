//! In-Memory Repositories
//!
//! Process-local implementations of the repository traits. They keep the
//! same guarantees as the Postgres versions (pair uniqueness, append order,
//! one-way read flag) and back the test suite and local runs without a
//! database.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::domain::{
    Conversation, ConversationRepository, Message, MessageRepository, ParticipantPair,
    UserDirectory, UserProfile,
};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

#[derive(Default)]
struct ConversationTables {
    by_id: HashMap<Uuid, Conversation>,
    by_pair: HashMap<ParticipantPair, Uuid>,
    /// Insertion order, so listings are stable.
    order: Vec<Uuid>,
}

impl ConversationTables {
    fn insert(&mut self, conversation: Conversation) {
        self.by_pair.insert(conversation.pair(), conversation.id);
        self.order.push(conversation.id);
        self.by_id.insert(conversation.id, conversation);
    }

    fn by_pair(&self, pair: &ParticipantPair) -> Option<Conversation> {
        self.by_pair
            .get(pair)
            .and_then(|id| self.by_id.get(id))
            .cloned()
    }
}

/// In-memory conversation store. One lock covers the check and the insert.
#[derive(Default)]
pub struct InMemoryConversationRepository {
    tables: Mutex<ConversationTables>,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tables.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>, AppError> {
        Ok(self.tables.lock().by_id.get(&id).cloned())
    }

    async fn find_by_pair(&self, pair: ParticipantPair) -> Result<Option<Conversation>, AppError> {
        Ok(self.tables.lock().by_pair(&pair))
    }

    async fn find_for_participant(&self, user_id: Uuid) -> Result<Vec<Conversation>, AppError> {
        let tables = self.tables.lock();
        Ok(tables
            .order
            .iter()
            .filter_map(|id| tables.by_id.get(id))
            .filter(|c| c.has_participant(user_id))
            .cloned()
            .collect())
    }

    async fn insert(&self, conversation: &Conversation) -> Result<Conversation, AppError> {
        let mut tables = self.tables.lock();
        if tables.by_pair.contains_key(&conversation.pair()) {
            return Err(AppError::Conflict("Chat already exists".into()));
        }
        tables.insert(conversation.clone());
        metrics::record_conversation_created();
        Ok(conversation.clone())
    }

    async fn find_or_create(&self, pair: ParticipantPair) -> Result<Conversation, AppError> {
        let mut tables = self.tables.lock();
        if let Some(existing) = tables.by_pair(&pair) {
            return Ok(existing);
        }
        let conversation = Conversation::start(pair);
        tables.insert(conversation.clone());
        metrics::record_conversation_created();
        Ok(conversation)
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// In-memory message log, kept in append order per conversation.
#[derive(Default)]
pub struct InMemoryMessageRepository {
    by_chat: RwLock<HashMap<Uuid, Vec<Message>>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored messages across all conversations.
    pub fn len(&self) -> usize {
        self.by_chat.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn append(&self, message: &Message) -> Result<Message, AppError> {
        self.by_chat
            .write()
            .entry(message.chat_id)
            .or_default()
            .push(message.clone());
        Ok(message.clone())
    }

    async fn list_by_conversation(&self, chat_id: Uuid) -> Result<Vec<Message>, AppError> {
        let mut messages = self
            .by_chat
            .read()
            .get(&chat_id)
            .cloned()
            .unwrap_or_default();
        // Stable sort keeps append order for equal timestamps.
        messages.sort_by_key(|m| m.sent_at);
        Ok(messages)
    }

    async fn mark_read_except_sender(&self, chat_id: Uuid, reader_id: Uuid) -> Result<u64, AppError> {
        let mut by_chat = self.by_chat.write();
        let Some(messages) = by_chat.get_mut(&chat_id) else {
            return Ok(0);
        };

        let mut changed = 0;
        for message in messages
            .iter_mut()
            .filter(|m| m.sender_id != reader_id && !m.is_read)
        {
            message.is_read = true;
            changed += 1;
        }
        Ok(changed)
    }
}

/// In-memory user directory.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    profiles: RwLock<HashMap<Uuid, UserProfile>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: UserProfile) {
        self.profiles.write().insert(profile.id, profile);
    }

    pub fn remove(&self, user_id: Uuid) -> Option<UserProfile> {
        self.profiles.write().remove(&user_id)
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError> {
        Ok(self.profiles.read().get(&user_id).cloned())
    }
}
