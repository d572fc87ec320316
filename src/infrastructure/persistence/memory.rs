//! In-memory conversation/message store.
//!
//! The single-process store the design calls for. Two locking scopes give
//! the required serialization discipline:
//! - the key index mutex makes resolve-or-create an atomic
//!   insert-if-absent, so racing callers can never create two rows for one
//!   `(participant pair, property)` key;
//! - each conversation entry sits behind its own mutex, so sequence
//!   assignment and the unread/last-message bookkeeping that accompany an
//!   append are serialized per conversation and sequences stay gap-free.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::domain::model::{Conversation, ConversationKey, Message, MessageDraft};
use crate::domain::repository::{ConversationRepository, MessageRepository};
use crate::error::StoreError;

#[derive(Debug)]
struct ConversationEntry {
    conversation: Conversation,
    messages: Vec<Message>,
    next_sequence: u64,
}

impl ConversationEntry {
    fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            messages: Vec::new(),
            next_sequence: 1,
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    index: Mutex<HashMap<ConversationKey, String>>,
    entries: RwLock<HashMap<String, Arc<Mutex<ConversationEntry>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, conversation_id: &str) -> Result<Arc<Mutex<ConversationEntry>>, StoreError> {
        let entries = self.entries.read().await;
        entries
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("conversation {conversation_id}")))
    }
}

#[async_trait]
impl ConversationRepository for MemoryStore {
    async fn resolve_or_create(
        &self,
        key: &ConversationKey,
    ) -> Result<(Conversation, bool), StoreError> {
        // The index lock is held across the whole resolve-or-create, which
        // is what makes the at-most-one-row invariant hold under races.
        let mut index = self.index.lock().await;
        if let Some(conversation_id) = index.get(key) {
            let entry = self.entry(conversation_id).await?;
            let entry = entry.lock().await;
            return Ok((entry.conversation.clone(), false));
        }

        let conversation = Conversation::new(key);
        let conversation_id = conversation.id.clone();
        {
            let mut entries = self.entries.write().await;
            entries.insert(
                conversation_id.clone(),
                Arc::new(Mutex::new(ConversationEntry::new(conversation.clone()))),
            );
        }
        index.insert(key.clone(), conversation_id);
        Ok((conversation, true))
    }

    async fn get(&self, conversation_id: &str) -> Result<Option<Conversation>, StoreError> {
        let entries = self.entries.read().await;
        let Some(entry) = entries.get(conversation_id).cloned() else {
            return Ok(None);
        };
        drop(entries);
        let entry = entry.lock().await;
        Ok(Some(entry.conversation.clone()))
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>, StoreError> {
        let handles: Vec<Arc<Mutex<ConversationEntry>>> = {
            let entries = self.entries.read().await;
            entries.values().cloned().collect()
        };
        let mut conversations = Vec::new();
        for handle in handles {
            let entry = handle.lock().await;
            if entry.conversation.is_participant(user_id) {
                conversations.push(entry.conversation.clone());
            }
        }
        Ok(conversations)
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn append(
        &self,
        conversation_id: &str,
        draft: MessageDraft,
    ) -> Result<Message, StoreError> {
        let entry = self.entry(conversation_id).await?;
        let mut entry = entry.lock().await;

        let sequence = entry.next_sequence;
        entry.next_sequence += 1;

        let mut message = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            sender_id: draft.sender_id,
            content: draft.content,
            message_type: draft.message_type,
            attachments: draft.attachments,
            read_by: Default::default(),
            sequence,
            created_at: Utc::now(),
        };
        message.read_by.insert(message.sender_id.clone());

        entry.conversation.last_message_id = Some(message.id.clone());
        entry.conversation.updated_at = message.created_at;
        let sender_id = message.sender_id.clone();
        for participant in entry.conversation.participants.clone() {
            if participant != sender_id {
                *entry
                    .conversation
                    .unread_counts
                    .entry(participant)
                    .or_insert(0) += 1;
            }
        }

        entry.messages.push(message.clone());
        Ok(message)
    }

    async fn history(
        &self,
        conversation_id: &str,
        after_sequence: Option<u64>,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let entry = self.entry(conversation_id).await?;
        let entry = entry.lock().await;
        let watermark = after_sequence.unwrap_or(0);
        Ok(entry
            .messages
            .iter()
            .filter(|m| m.sequence > watermark)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, conversation_id: &str, user_id: &str) -> Result<(), StoreError> {
        let entry = self.entry(conversation_id).await?;
        let mut entry = entry.lock().await;
        entry
            .conversation
            .unread_counts
            .insert(user_id.to_string(), 0);
        for message in &mut entry.messages {
            message.read_by.insert(user_id.to_string());
        }
        Ok(())
    }
}
