//! Typing indicators: ephemeral per-(conversation, user) signals.
//!
//! A signal re-arms a short expiry; when no refresh arrives before the
//! deadline the coordinator emits stop-typing on its own, so a client that
//! vanishes mid-type never leaves a stuck indicator. Nothing here is ever
//! persisted. Refreshes bump a generation counter; a timer task whose
//! generation is stale simply ends without emitting anything.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

/// Typing signal routed out to a conversation's room, bypassing the origin
/// connection when one is known.
#[derive(Clone, Debug)]
pub struct TypingEvent {
    pub conversation_id: String,
    pub user_id: String,
    pub typing: bool,
    pub origin_connection: Option<String>,
}

/// Delivery seam; the realtime room registry implements this.
#[async_trait]
pub trait TypingEventSink: Send + Sync {
    async fn publish_typing(&self, event: TypingEvent);
}

type TypingKey = (String, String);

#[derive(Debug)]
struct TypingEntry {
    generation: u64,
    origin_connection: Option<String>,
}

pub struct TypingService {
    entries: Arc<DashMap<TypingKey, TypingEntry>>,
    sink: Arc<dyn TypingEventSink>,
    expiry: Duration,
}

impl TypingService {
    pub fn new(sink: Arc<dyn TypingEventSink>, expiry: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            sink,
            expiry,
        }
    }

    /// Broadcast user-typing immediately and (re)arm the expiry timer.
    pub async fn signal_typing(
        &self,
        conversation_id: &str,
        user_id: &str,
        origin_connection: Option<&str>,
    ) {
        let key: TypingKey = (conversation_id.to_string(), user_id.to_string());
        let generation = {
            let mut entry = self.entries.entry(key.clone()).or_insert(TypingEntry {
                generation: 0,
                origin_connection: None,
            });
            entry.generation += 1;
            entry.origin_connection = origin_connection.map(str::to_string);
            entry.generation
        };

        self.sink
            .publish_typing(TypingEvent {
                conversation_id: conversation_id.to_string(),
                user_id: user_id.to_string(),
                typing: true,
                origin_connection: origin_connection.map(str::to_string),
            })
            .await;

        let entries = Arc::clone(&self.entries);
        let sink = Arc::clone(&self.sink);
        let expiry = self.expiry;
        tokio::spawn(async move {
            tokio::time::sleep(expiry).await;
            // Only the timer matching the latest signal may expire the entry.
            let expired = entries.remove_if(&key, |_, entry| entry.generation == generation);
            if let Some((key, entry)) = expired {
                debug!(conversation_id = %key.0, user_id = %key.1, "typing expired");
                sink.publish_typing(TypingEvent {
                    conversation_id: key.0,
                    user_id: key.1,
                    typing: false,
                    origin_connection: entry.origin_connection,
                })
                .await;
            }
        });
    }

    /// Explicit stop from the client.
    pub async fn stop_typing(&self, conversation_id: &str, user_id: &str) {
        let key: TypingKey = (conversation_id.to_string(), user_id.to_string());
        if let Some((key, entry)) = self.entries.remove(&key) {
            self.sink
                .publish_typing(TypingEvent {
                    conversation_id: key.0,
                    user_id: key.1,
                    typing: false,
                    origin_connection: entry.origin_connection,
                })
                .await;
        }
    }

    /// Disconnect fast path: clear every conversation the user was typing in.
    pub async fn cancel_user(&self, user_id: &str) {
        let keys: Vec<TypingKey> = self
            .entries
            .iter()
            .filter(|entry| entry.key().1 == user_id)
            .map(|entry| entry.key().clone())
            .collect();
        for key in keys {
            if let Some((key, entry)) = self.entries.remove(&key) {
                self.sink
                    .publish_typing(TypingEvent {
                        conversation_id: key.0,
                        user_id: key.1,
                        typing: false,
                        origin_connection: entry.origin_connection,
                    })
                    .await;
            }
        }
    }

    pub fn is_typing(&self, conversation_id: &str, user_id: &str) -> bool {
        self.entries
            .contains_key(&(conversation_id.to_string(), user_id.to_string()))
    }
}
