//! Presence tracking: per-user connection reference counting.
//!
//! A user is online iff they hold at least one live connection. Transitions
//! are emitted only on the empty↔non-empty edge of the connection set, so a
//! second browser tab never flips presence, and closing a connection twice
//! is a no-op. All mutations go through one async write lock, which keeps
//! open/close for the same user linearizable.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::model::{PresenceStatus, PresenceTransition};

#[derive(Debug, Default)]
struct PresenceEntry {
    connections: HashSet<String>,
    last_seen_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct PresenceService {
    users: RwLock<HashMap<String, PresenceEntry>>,
}

impl PresenceService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection. Returns the Offline→Online transition when
    /// this is the user's first live connection.
    pub async fn connection_opened(
        &self,
        user_id: &str,
        connection_id: &str,
    ) -> Option<PresenceTransition> {
        let mut users = self.users.write().await;
        let entry = users.entry(user_id.to_string()).or_default();
        let was_offline = entry.connections.is_empty();
        if !entry.connections.insert(connection_id.to_string()) {
            return None;
        }
        debug!(
            user_id = %user_id,
            connection_id = %connection_id,
            connections = entry.connections.len(),
            "connection opened"
        );
        was_offline.then(|| PresenceTransition {
            user_id: user_id.to_string(),
            online: true,
            last_seen_at: None,
        })
    }

    /// Record a closed connection. Returns the Online→Offline transition
    /// when the last live connection goes away; unknown connections and
    /// repeated closes are no-ops.
    pub async fn connection_closed(
        &self,
        user_id: &str,
        connection_id: &str,
    ) -> Option<PresenceTransition> {
        let mut users = self.users.write().await;
        let entry = users.get_mut(user_id)?;
        if !entry.connections.remove(connection_id) {
            return None;
        }
        debug!(
            user_id = %user_id,
            connection_id = %connection_id,
            connections = entry.connections.len(),
            "connection closed"
        );
        if entry.connections.is_empty() {
            let now = Utc::now();
            entry.last_seen_at = Some(now);
            return Some(PresenceTransition {
                user_id: user_id.to_string(),
                online: false,
                last_seen_at: Some(now),
            });
        }
        None
    }

    pub async fn is_online(&self, user_id: &str) -> bool {
        let users = self.users.read().await;
        users
            .get(user_id)
            .map(|entry| !entry.connections.is_empty())
            .unwrap_or(false)
    }

    /// Bulk presence for initial-load queries. Users never seen report as
    /// offline with no last-seen timestamp.
    pub async fn snapshot(&self, user_ids: &[String]) -> HashMap<String, PresenceStatus> {
        let users = self.users.read().await;
        user_ids
            .iter()
            .map(|user_id| {
                let status = users
                    .get(user_id)
                    .map(|entry| PresenceStatus {
                        online: !entry.connections.is_empty(),
                        last_seen_at: entry.last_seen_at,
                    })
                    .unwrap_or(PresenceStatus {
                        online: false,
                        last_seen_at: None,
                    });
                (user_id.clone(), status)
            })
            .collect()
    }
}
