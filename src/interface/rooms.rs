//! Connection registry and room multicast.
//!
//! Each live connection owns an unbounded outbound channel; rooms are
//! multicast groups of connection ids keyed by conversation id. Delivery to
//! a closed channel is ignored, the disconnect path cleans the entry up.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::trace;

use crate::domain::service::{TypingEvent, TypingEventSink};
use crate::interface::events::ServerEvent;

#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    pub connection_id: String,
    pub user_id: String,
    sender: mpsc::UnboundedSender<ServerEvent>,
}

impl ConnectionHandle {
    fn send(&self, event: ServerEvent) {
        // A send to a closing connection is not an error; cleanup follows.
        let _ = self.sender.send(event);
    }
}

#[derive(Default)]
pub struct RoomRegistry {
    connections: DashMap<String, ConnectionHandle>,
    user_connections: DashMap<String, HashSet<String>>,
    rooms: DashMap<String, HashSet<String>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        user_id: &str,
        connection_id: &str,
        sender: mpsc::UnboundedSender<ServerEvent>,
    ) {
        self.connections.insert(
            connection_id.to_string(),
            ConnectionHandle {
                connection_id: connection_id.to_string(),
                user_id: user_id.to_string(),
                sender,
            },
        );
        self.user_connections
            .entry(user_id.to_string())
            .or_default()
            .insert(connection_id.to_string());
    }

    /// Remove a connection everywhere. Returns the owning user id, or
    /// `None` when the connection was already gone (idempotent).
    pub fn unregister(&self, connection_id: &str) -> Option<String> {
        let (_, handle) = self.connections.remove(connection_id)?;
        if let Some(mut connections) = self.user_connections.get_mut(&handle.user_id) {
            connections.remove(connection_id);
            if connections.is_empty() {
                drop(connections);
                self.user_connections
                    .remove_if(&handle.user_id, |_, set| set.is_empty());
            }
        }
        let mut emptied = Vec::new();
        for mut room in self.rooms.iter_mut() {
            let members = room.value_mut();
            if members.remove(connection_id) && members.is_empty() {
                emptied.push(room.key().clone());
            }
        }
        // Dropping emptied rooms keeps the map from accumulating tombstones;
        // removal happens outside the iteration to avoid re-entrant locking.
        for conversation_id in emptied {
            self.rooms
                .remove_if(&conversation_id, |_, members| members.is_empty());
        }
        Some(handle.user_id)
    }

    pub fn join(&self, conversation_id: &str, connection_id: &str) {
        self.rooms
            .entry(conversation_id.to_string())
            .or_default()
            .insert(connection_id.to_string());
    }

    pub fn user_of(&self, connection_id: &str) -> Option<String> {
        self.connections
            .get(connection_id)
            .map(|handle| handle.user_id.clone())
    }

    pub fn connection_count(&self, user_id: &str) -> usize {
        self.user_connections
            .get(user_id)
            .map(|set| set.len())
            .unwrap_or(0)
    }

    pub fn send_to_connection(&self, connection_id: &str, event: ServerEvent) {
        if let Some(handle) = self.connections.get(connection_id) {
            handle.send(event);
        }
    }

    /// Every connection of one user (their personal channel).
    pub fn send_to_user(&self, user_id: &str, event: ServerEvent) {
        let targets = self.user_targets(user_id);
        for connection_id in targets {
            self.send_to_connection(&connection_id, event.clone());
        }
    }

    /// Every connection joined to the conversation's room.
    pub fn multicast(&self, conversation_id: &str, event: ServerEvent) {
        self.multicast_inner(conversation_id, None, event);
    }

    /// Room multicast skipping one connection (typing origin).
    pub fn multicast_except(&self, conversation_id: &str, except: &str, event: ServerEvent) {
        self.multicast_inner(conversation_id, Some(except), event);
    }

    /// Presence changes go to every live connection.
    pub fn broadcast(&self, event: ServerEvent) {
        for handle in self.connections.iter() {
            handle.send(event.clone());
        }
    }

    fn multicast_inner(&self, conversation_id: &str, except: Option<&str>, event: ServerEvent) {
        let targets: Vec<String> = match self.rooms.get(conversation_id) {
            Some(room) => room
                .iter()
                .filter(|id| Some(id.as_str()) != except)
                .cloned()
                .collect(),
            None => return,
        };
        trace!(
            conversation_id = %conversation_id,
            targets = targets.len(),
            "room multicast"
        );
        for connection_id in targets {
            self.send_to_connection(&connection_id, event.clone());
        }
    }

    #[cfg(test)]
    fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn user_targets(&self, user_id: &str) -> Vec<String> {
        self.user_connections
            .get(user_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TypingEventSink for RoomRegistry {
    async fn publish_typing(&self, event: TypingEvent) {
        let server_event = if event.typing {
            ServerEvent::UserTyping {
                conversation_id: event.conversation_id.clone(),
                user_id: event.user_id.clone(),
            }
        } else {
            ServerEvent::UserStopTyping {
                conversation_id: event.conversation_id.clone(),
                user_id: event.user_id.clone(),
            }
        };
        match event.origin_connection.as_deref() {
            Some(origin) => self.multicast_except(&event.conversation_id, origin, server_event),
            None => self.multicast(&event.conversation_id, server_event),
        }
    }
}
