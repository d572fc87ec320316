//! Wire event vocabulary for the duplex client channel.
//!
//! A closed, tagged set of variants per event name; payloads are validated
//! here at the boundary before anything reaches a store. The transport is
//! abstract: any WebSocket-capable stack can carry these as JSON frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::model::{Attachment, Conversation, Message, MessageType};

/// Events a client sends over its live connection.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinConversation {
        conversation_id: String,
    },
    SendMessage {
        conversation_id: String,
        #[serde(default)]
        content: String,
        #[serde(default)]
        message_type: MessageType,
        #[serde(default)]
        attachments: Vec<Attachment>,
    },
    Typing {
        conversation_id: String,
    },
    StopTyping {
        conversation_id: String,
    },
    MarkRead {
        conversation_id: String,
    },
}

/// Events the server pushes to subscribed connections.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    ConversationJoined {
        conversation: Conversation,
    },
    ReceiveMessage {
        message: Message,
    },
    UserTyping {
        conversation_id: String,
        user_id: String,
    },
    UserStopTyping {
        conversation_id: String,
        user_id: String,
    },
    UserOnline {
        user_id: String,
    },
    UserOffline {
        user_id: String,
        last_seen_at: Option<DateTime<Utc>>,
    },
    /// Out-of-room pass-through on the personal user channel (booking
    /// alerts and the like); opaque to this core.
    Notice {
        payload: serde_json::Value,
    },
    Error {
        code: String,
        message: String,
    },
}
