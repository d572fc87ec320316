//! Conversation domain service: resolve-or-create and list assembly.

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::model::{Conversation, ConversationKey, ConversationSummary};
use crate::domain::repository::{ConversationRepository, PropertyDirectory, UserDirectory};
use crate::domain::service::StoreRetryPolicy;
use crate::error::{MessagingError, Result, StoreError};

pub struct ConversationService {
    conversations: Arc<dyn ConversationRepository>,
    users: Arc<dyn UserDirectory>,
    properties: Arc<dyn PropertyDirectory>,
    retry: StoreRetryPolicy,
}

impl ConversationService {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        users: Arc<dyn UserDirectory>,
        properties: Arc<dyn PropertyDirectory>,
        retry: StoreRetryPolicy,
    ) -> Self {
        Self {
            conversations,
            users,
            properties,
            retry,
        }
    }

    /// Resolve the unique conversation for a participant pair and optional
    /// property, creating it when absent. Idempotent under arbitrary
    /// concurrency: racing callers all receive the same conversation id.
    pub async fn resolve_or_create(
        &self,
        participant_a: &str,
        participant_b: &str,
        property_id: Option<&str>,
    ) -> Result<Conversation> {
        if participant_a == participant_b {
            return Err(MessagingError::Validation(
                "a conversation requires two distinct participants".to_string(),
            ));
        }
        self.require_user(participant_a).await?;
        self.require_user(participant_b).await?;
        if let Some(property_id) = property_id {
            let known = self.properties.exists(property_id).await.map_err(store_err)?;
            if !known {
                return Err(MessagingError::Validation(format!(
                    "unknown property {property_id}"
                )));
            }
        }

        let key = ConversationKey::new(participant_a, participant_b, property_id);
        // Transient conflicts come from the store's insert-then-retry
        // discipline; they settle by re-resolving with the same key.
        let (conversation, created) = self
            .retry
            .run("conversation_resolve", || {
                self.conversations.resolve_or_create(&key)
            })
            .await
            .map_err(store_err)?;
        if created {
            info!(
                conversation_id = %conversation.id,
                participant_a = %participant_a,
                participant_b = %participant_b,
                property_id = ?property_id,
                "conversation created"
            );
        } else {
            debug!(conversation_id = %conversation.id, "conversation resolved");
        }
        Ok(conversation)
    }

    /// Fetch a conversation, rejecting callers who are not participants.
    pub async fn get_authorized(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Conversation> {
        let conversation = self
            .retry
            .run("conversation_get", || self.conversations.get(conversation_id))
            .await
            .map_err(store_err)?
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

    /// Conversations for one user, unread-first then most recently updated.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<ConversationSummary>> {
        let conversations = self
            .retry
            .run("conversation_list", || {
                self.conversations.list_for_user(user_id)
            })
            .await
            .map_err(store_err)?;
        let mut summaries: Vec<ConversationSummary> = conversations
            .iter()
            .map(|c| ConversationSummary::for_user(c, user_id))
            .collect();
        summaries.sort_by(|a, b| {
            if a.unread_count != b.unread_count {
                return b.unread_count.cmp(&a.unread_count);
            }
            b.updated_at.cmp(&a.updated_at)
        });
        Ok(summaries)
    }

    async fn require_user(&self, user_id: &str) -> Result<()> {
        let known = self.users.exists(user_id).await.map_err(store_err)?;
        if !known {
            return Err(MessagingError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }
}

fn store_err(err: StoreError) -> MessagingError {
    err.into()
}
