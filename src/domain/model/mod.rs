//! Domain model for conversations, messages, presence and typing state.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity key for a conversation: the sorted participant pair plus an
/// optional property tag. Two users share at most one conversation per
/// property.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    participants: [String; 2],
    property_id: Option<String>,
}

impl ConversationKey {
    /// Build a key from an unordered participant pair. The pair is sorted
    /// so that `(a, b)` and `(b, a)` resolve identically.
    pub fn new(a: &str, b: &str, property_id: Option<&str>) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self {
            participants: [first.to_string(), second.to_string()],
            property_id: property_id.map(|p| p.to_string()),
        }
    }

    pub fn participants(&self) -> &[String; 2] {
        &self.participants
    }

    pub fn property_id(&self) -> Option<&str> {
        self.property_id.as_deref()
    }
}

/// Durable thread between exactly two participants.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    /// Sorted pair of participant user ids.
    pub participants: [String; 2],
    pub property_id: Option<String>,
    pub last_message_id: Option<String>,
    /// Per-participant count of messages past their read watermark.
    pub unread_counts: HashMap<String, u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(key: &ConversationKey) -> Self {
        let now = Utc::now();
        let participants = key.participants().clone();
        let unread_counts = participants
            .iter()
            .map(|p| (p.clone(), 0))
            .collect::<HashMap<_, _>>();
        Self {
            id: Uuid::new_v4().to_string(),
            participants,
            property_id: key.property_id().map(|p| p.to_string()),
            last_message_id: None,
            unread_counts,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    /// The participant opposite `user_id`, if `user_id` is a participant.
    pub fn other_participant(&self, user_id: &str) -> Option<&str> {
        if !self.is_participant(user_id) {
            return None;
        }
        self.participants
            .iter()
            .find(|p| p.as_str() != user_id)
            .map(|p| p.as_str())
    }

    pub fn unread_for(&self, user_id: &str) -> u64 {
        self.unread_counts.get(user_id).copied().unwrap_or(0)
    }
}

/// One conversation as seen by one participant in a list view.
#[derive(Clone, Debug, Serialize)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub participants: [String; 2],
    pub property_id: Option<String>,
    pub last_message_id: Option<String>,
    pub unread_count: u64,
    pub updated_at: DateTime<Utc>,
}

impl ConversationSummary {
    pub fn for_user(conversation: &Conversation, user_id: &str) -> Self {
        Self {
            conversation_id: conversation.id.clone(),
            participants: conversation.participants.clone(),
            property_id: conversation.property_id.clone(),
            last_message_id: conversation.last_message_id.clone(),
            unread_count: conversation.unread_for(user_id),
            updated_at: conversation.updated_at,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Video,
    File,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Video => "video",
            MessageType::File => "file",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "text" => Some(MessageType::Text),
            "image" => Some(MessageType::Image),
            "video" => Some(MessageType::Video),
            "file" => Some(MessageType::File),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub url: String,
}

/// Immutable, append-only message. `sequence` is server-assigned, strictly
/// increasing and gap-free within a conversation, and is the sole ordering
/// key; client timestamps are never used for ordering.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub message_type: MessageType,
    pub attachments: Vec<Attachment>,
    pub read_by: HashSet<String>,
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
}

/// Validated message payload handed to the store; id, sequence and
/// timestamp are assigned at append time.
#[derive(Clone, Debug)]
pub struct MessageDraft {
    pub sender_id: String,
    pub content: String,
    pub message_type: MessageType,
    pub attachments: Vec<Attachment>,
}

/// User profile as served by the external directory. Read-only here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub email: String,
}

/// Credentials presented when a live connection is established.
#[derive(Clone, Debug, Deserialize)]
pub struct Credentials {
    pub user_id: String,
    pub token: String,
}

/// Point-in-time presence for one user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PresenceStatus {
    pub online: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
}

/// Edge of the per-user presence state machine, emitted only when the
/// connection set crosses empty↔non-empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresenceTransition {
    pub user_id: String,
    pub online: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
}
