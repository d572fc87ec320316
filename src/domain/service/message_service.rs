//! Message domain service: validated append, read watermarks, history.

use std::sync::Arc;

use tracing::debug;

use crate::domain::model::{Attachment, Conversation, Message, MessageDraft, MessageType};
use crate::domain::repository::{ConversationRepository, MessageRepository};
use crate::domain::service::StoreRetryPolicy;
use crate::error::{MessagingError, Result};

pub struct MessageService {
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageRepository>,
    history_page_size: usize,
    retry: StoreRetryPolicy,
}

impl MessageService {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageRepository>,
        history_page_size: usize,
        retry: StoreRetryPolicy,
    ) -> Self {
        Self {
            conversations,
            messages,
            history_page_size,
            retry,
        }
    }

    /// Append a message. The store assigns the sequence, stamps the server
    /// clock, advances the conversation's last-message pointer and bumps the
    /// unread counter of every other participant.
    pub async fn append(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: String,
        message_type: MessageType,
        attachments: Vec<Attachment>,
    ) -> Result<Message> {
        let conversation = self.require_participant(conversation_id, sender_id).await?;
        if content.trim().is_empty() && attachments.is_empty() {
            return Err(MessagingError::Validation(
                "message needs content or at least one attachment".to_string(),
            ));
        }
        if attachments.iter().any(|a| a.url.trim().is_empty()) {
            return Err(MessagingError::Validation(
                "attachment url must not be empty".to_string(),
            ));
        }

        let draft = MessageDraft {
            sender_id: sender_id.to_string(),
            content,
            message_type,
            attachments,
        };
        // Sequence races surface as conflicts; re-appending the same draft
        // settles them without the caller noticing.
        let message = self
            .retry
            .run("message_append", || {
                self.messages.append(&conversation.id, draft.clone())
            })
            .await
            .map_err(MessagingError::from)?;
        debug!(
            conversation_id = %conversation.id,
            message_id = %message.id,
            sequence = message.sequence,
            "message appended"
        );
        Ok(message)
    }

    /// Reset the caller's unread counter and stamp them into `read_by`.
    pub async fn mark_read(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        self.require_participant(conversation_id, user_id).await?;
        self.retry
            .run("message_mark_read", || {
                self.messages.mark_read(conversation_id, user_id)
            })
            .await
            .map_err(MessagingError::from)
    }

    /// Message history in ascending sequence order, resumable from a
    /// watermark. The page size is clamped to the configured maximum.
    pub async fn history(
        &self,
        conversation_id: &str,
        user_id: &str,
        after_sequence: Option<u64>,
        limit: Option<usize>,
    ) -> Result<Vec<Message>> {
        self.require_participant(conversation_id, user_id).await?;
        let limit = limit
            .unwrap_or(self.history_page_size)
            .min(self.history_page_size);
        self.retry
            .run("message_history", || {
                self.messages.history(conversation_id, after_sequence, limit)
            })
            .await
            .map_err(MessagingError::from)
    }

    async fn require_participant(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Conversation> {
        let conversation = self
            .retry
            .run("conversation_get", || self.conversations.get(conversation_id))
            .await
            .map_err(MessagingError::from)?
            .ok_or_else(|| {
                MessagingError::NotFound(format!("conversation {conversation_id}"))
            })?;
        if !conversation.is_participant(user_id) {
            return Err(MessagingError::Authorization(format!(
                "user {user_id} is not a participant of conversation {conversation_id}"
            )));
        }
        Ok(conversation)
    }
}
