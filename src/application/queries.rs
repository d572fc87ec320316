//! Query payloads for the request/response surface.

use serde::Deserialize;

/// Conversations for one user, each with that user's unread count.
#[derive(Clone, Debug, Deserialize)]
pub struct ConversationListQuery {
    pub user_id: String,
}

/// Message history paginated by sequence watermark.
#[derive(Clone, Debug, Deserialize)]
pub struct MessageHistoryQuery {
    pub conversation_id: String,
    pub user_id: String,
    pub after_sequence: Option<u64>,
    pub limit: Option<usize>,
}

/// Bulk presence for initial load.
#[derive(Clone, Debug, Deserialize)]
pub struct PresenceSnapshotQuery {
    pub user_ids: Vec<String>,
}
