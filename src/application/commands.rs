//! Command payloads for the request/response surface.

use serde::Deserialize;

use crate::domain::model::{Attachment, MessageType};

/// Create-or-fetch the conversation between two users, optionally scoped to
/// a property.
#[derive(Clone, Debug, Deserialize)]
pub struct ResolveConversationCommand {
    pub initiator_id: String,
    pub peer_id: String,
    pub property_id: Option<String>,
}

/// Append a message outside the live channel (e.g. the initial inquiry sent
/// from a listing page before a socket exists).
#[derive(Clone, Debug, Deserialize)]
pub struct SendMessageCommand {
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MarkReadCommand {
    pub conversation_id: String,
    pub user_id: String,
}
