//! Store and collaborator seams (trait objects, async-trait).

use async_trait::async_trait;

use crate::domain::model::{
    Conversation, ConversationKey, Credentials, Message, MessageDraft, UserProfile,
};
use crate::error::{MessagingError, StoreError};

/// Conversation store. `resolve_or_create` must be atomic for a given key:
/// when N callers race on the same key exactly one row is created and every
/// caller observes the same conversation. Implementations may report a
/// transient `StoreError::Conflict`, which callers retry.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Returns the conversation for the key and whether this call created it.
    async fn resolve_or_create(
        &self,
        key: &ConversationKey,
    ) -> Result<(Conversation, bool), StoreError>;

    async fn get(&self, conversation_id: &str) -> Result<Option<Conversation>, StoreError>;

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>, StoreError>;
}

/// Message store. `append` assigns the next per-conversation sequence and
/// advances the conversation's last-message pointer and unread counters in
/// the same serialization scope, so sequences stay gap-free.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn append(
        &self,
        conversation_id: &str,
        draft: MessageDraft,
    ) -> Result<Message, StoreError>;

    /// Ascending by sequence, strictly after `after_sequence` when given.
    async fn history(
        &self,
        conversation_id: &str,
        after_sequence: Option<u64>,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError>;

    /// Zero the participant's unread counter and stamp them into `read_by`
    /// on every message not already carrying them.
    async fn mark_read(&self, conversation_id: &str, user_id: &str) -> Result<(), StoreError>;
}

/// External user directory; users are owned elsewhere and read-only here.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn exists(&self, user_id: &str) -> Result<bool, StoreError>;

    async fn get(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError>;
}

/// External property service; only existence checks are consumed.
#[async_trait]
pub trait PropertyDirectory: Send + Sync {
    async fn exists(&self, property_id: &str) -> Result<bool, StoreError>;
}

/// Outbound email fan-out. Best effort: callers spawn it, bound its
/// retries, log failures and never let it touch the send path.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send_inquiry_email(
        &self,
        to_email: &str,
        from_name: &str,
        from_email: &str,
        body: &str,
    ) -> anyhow::Result<()>;
}

/// Connection-time authentication.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials)
    -> Result<UserProfile, MessagingError>;
}
