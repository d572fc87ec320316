//! Command and query handlers: the companion request/response surface
//! outside the live channel. Each handler validates through the domain
//! services and is transport-agnostic.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::instrument;

use crate::application::commands::{MarkReadCommand, ResolveConversationCommand, SendMessageCommand};
use crate::application::queries::{
    ConversationListQuery, MessageHistoryQuery, PresenceSnapshotQuery,
};
use crate::domain::model::{Conversation, ConversationSummary, Message, PresenceStatus};
use crate::domain::service::{ConversationService, MessageService, PresenceService};
use crate::error::Result;

pub struct MessagingCommandHandler {
    conversations: Arc<ConversationService>,
    messages: Arc<MessageService>,
}

impl MessagingCommandHandler {
    pub fn new(conversations: Arc<ConversationService>, messages: Arc<MessageService>) -> Self {
        Self {
            conversations,
            messages,
        }
    }

    #[instrument(skip(self, command), fields(initiator = %command.initiator_id))]
    pub async fn resolve_conversation(
        &self,
        command: ResolveConversationCommand,
    ) -> Result<Conversation> {
        self.conversations
            .resolve_or_create(
                &command.initiator_id,
                &command.peer_id,
                command.property_id.as_deref(),
            )
            .await
    }

    #[instrument(skip(self, command), fields(conversation_id = %command.conversation_id))]
    pub async fn send_message(&self, command: SendMessageCommand) -> Result<Message> {
        self.messages
            .append(
                &command.conversation_id,
                &command.sender_id,
                command.content,
                command.message_type,
                command.attachments,
            )
            .await
    }

    #[instrument(skip(self, command), fields(conversation_id = %command.conversation_id))]
    pub async fn mark_read(&self, command: MarkReadCommand) -> Result<()> {
        self.messages
            .mark_read(&command.conversation_id, &command.user_id)
            .await
    }
}

pub struct MessagingQueryHandler {
    conversations: Arc<ConversationService>,
    messages: Arc<MessageService>,
    presence: Arc<PresenceService>,
}

impl MessagingQueryHandler {
    pub fn new(
        conversations: Arc<ConversationService>,
        messages: Arc<MessageService>,
        presence: Arc<PresenceService>,
    ) -> Self {
        Self {
            conversations,
            messages,
            presence,
        }
    }

    pub async fn conversation_list(
        &self,
        query: ConversationListQuery,
    ) -> Result<Vec<ConversationSummary>> {
        self.conversations.list_for_user(&query.user_id).await
    }

    pub async fn message_history(&self, query: MessageHistoryQuery) -> Result<Vec<Message>> {
        self.messages
            .history(
                &query.conversation_id,
                &query.user_id,
                query.after_sequence,
                query.limit,
            )
            .await
    }

    pub async fn presence_snapshot(
        &self,
        query: PresenceSnapshotQuery,
    ) -> Result<HashMap<String, PresenceStatus>> {
        Ok(self.presence.snapshot(&query.user_ids).await)
    }
}
