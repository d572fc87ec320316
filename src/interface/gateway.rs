//! Realtime gateway: the connection/session layer.
//!
//! One logical task per live connection. The gateway authenticates a
//! connection, registers it with presence, joins it to conversation rooms,
//! routes client events into the domain services and multicasts the results
//! back out. Validation and authorization failures are answered with an
//! error event on the originating connection and mutate nothing.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::model::{Attachment, Credentials, MessageType, PresenceTransition};
use crate::domain::repository::{Authenticator, UserDirectory};
use crate::domain::service::{ConversationService, MessageService, PresenceService, TypingService};
use crate::error::Result;
use crate::infrastructure::notification::RetryingNotifier;
use crate::interface::events::{ClientEvent, ServerEvent};
use crate::interface::rooms::RoomRegistry;

/// What the transport layer holds for one authenticated connection: its id
/// and the outbound event stream to drain to the client.
pub struct ClientSession {
    pub connection_id: String,
    pub user_id: String,
    pub events: mpsc::UnboundedReceiver<ServerEvent>,
}

pub struct RealtimeGateway {
    registry: Arc<RoomRegistry>,
    presence: Arc<PresenceService>,
    typing: Arc<TypingService>,
    conversations: Arc<ConversationService>,
    messages: Arc<MessageService>,
    users: Arc<dyn UserDirectory>,
    authenticator: Arc<dyn Authenticator>,
    notifier: Arc<RetryingNotifier>,
}

impl RealtimeGateway {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<RoomRegistry>,
        presence: Arc<PresenceService>,
        typing: Arc<TypingService>,
        conversations: Arc<ConversationService>,
        messages: Arc<MessageService>,
        users: Arc<dyn UserDirectory>,
        authenticator: Arc<dyn Authenticator>,
        notifier: Arc<RetryingNotifier>,
    ) -> Self {
        Self {
            registry,
            presence,
            typing,
            conversations,
            messages,
            users,
            authenticator,
            notifier,
        }
    }

    /// Authenticate and register a new live connection. The connection is
    /// subscribed to the user's personal channel and presence is updated;
    /// an Offline→Online edge is broadcast to every live connection.
    pub async fn connect(&self, credentials: Credentials) -> Result<ClientSession> {
        let profile = self.authenticator.authenticate(&credentials).await?;
        let connection_id = Uuid::new_v4().to_string();
        let (sender, events) = mpsc::unbounded_channel();
        self.registry.register(&profile.id, &connection_id, sender);

        if let Some(transition) = self
            .presence
            .connection_opened(&profile.id, &connection_id)
            .await
        {
            self.broadcast_presence(transition);
        }

        info!(user_id = %profile.id, connection_id = %connection_id, "connection established");
        Ok(ClientSession {
            connection_id,
            user_id: profile.id,
            events,
        })
    }

    /// Route one client event. Failures are reported back on the same
    /// connection as an `error` event and leave no partial state behind.
    pub async fn handle_event(&self, connection_id: &str, event: ClientEvent) {
        let Some(user_id) = self.registry.user_of(connection_id) else {
            warn!(connection_id = %connection_id, "event from unknown connection dropped");
            return;
        };
        if let Err(err) = self.dispatch(connection_id, &user_id, event).await {
            warn!(
                connection_id = %connection_id,
                user_id = %user_id,
                error = %err,
                "client event rejected"
            );
            self.registry.send_to_connection(
                connection_id,
                ServerEvent::Error {
                    code: err.code().to_string(),
                    message: err.to_string(),
                },
            );
        }
    }

    /// Tear down a connection. Idempotent: a second close, or a close
    /// racing with a send, finds nothing to undo.
    pub async fn disconnect(&self, connection_id: &str) {
        let Some(user_id) = self.registry.unregister(connection_id) else {
            return;
        };
        self.typing.cancel_user(&user_id).await;
        if let Some(transition) = self
            .presence
            .connection_closed(&user_id, connection_id)
            .await
        {
            self.broadcast_presence(transition);
        }
        info!(user_id = %user_id, connection_id = %connection_id, "connection closed");
    }

    async fn dispatch(
        &self,
        connection_id: &str,
        user_id: &str,
        event: ClientEvent,
    ) -> Result<()> {
        match event {
            ClientEvent::JoinConversation { conversation_id } => {
                let conversation = self
                    .conversations
                    .get_authorized(&conversation_id, user_id)
                    .await?;
                self.registry.join(&conversation.id, connection_id);
                self.registry.send_to_connection(
                    connection_id,
                    ServerEvent::ConversationJoined { conversation },
                );
                Ok(())
            }
            ClientEvent::SendMessage {
                conversation_id,
                content,
                message_type,
                attachments,
            } => {
                self.send_message(user_id, &conversation_id, content, message_type, attachments)
                    .await
            }
            ClientEvent::Typing { conversation_id } => {
                self.conversations
                    .get_authorized(&conversation_id, user_id)
                    .await?;
                self.typing
                    .signal_typing(&conversation_id, user_id, Some(connection_id))
                    .await;
                Ok(())
            }
            ClientEvent::StopTyping { conversation_id } => {
                self.typing.stop_typing(&conversation_id, user_id).await;
                Ok(())
            }
            ClientEvent::MarkRead { conversation_id } => {
                self.messages.mark_read(&conversation_id, user_id).await
            }
        }
    }

    async fn send_message(
        &self,
        sender_id: &str,
        conversation_id: &str,
        content: String,
        message_type: MessageType,
        attachments: Vec<Attachment>,
    ) -> Result<()> {
        let conversation = self
            .conversations
            .get_authorized(conversation_id, sender_id)
            .await?;
        let message = self
            .messages
            .append(
                conversation_id,
                sender_id,
                content,
                message_type,
                attachments,
            )
            .await?;

        // Every room subscriber gets the message, the sender's own other
        // connections included, which is what keeps multiple tabs in sync.
        self.registry.multicast(
            conversation_id,
            ServerEvent::ReceiveMessage {
                message: message.clone(),
            },
        );

        if let Some(recipient) = conversation.other_participant(sender_id) {
            if !self.presence.is_online(recipient).await {
                self.notify_offline_recipient(sender_id, recipient, &message.content)
                    .await;
            }
        }
        Ok(())
    }

    /// Email fan-out for a recipient with no live connection. Best effort:
    /// directory misses are logged and the send path is already done.
    async fn notify_offline_recipient(&self, sender_id: &str, recipient_id: &str, body: &str) {
        let recipient = match self.users.get(recipient_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                warn!(user_id = %recipient_id, "offline recipient missing from directory");
                return;
            }
            Err(err) => {
                warn!(user_id = %recipient_id, error = %err, "directory lookup failed");
                return;
            }
        };
        let sender = match self.users.get(sender_id).await {
            Ok(Some(profile)) => profile,
            _ => {
                warn!(user_id = %sender_id, "sender profile unavailable, skipping email");
                return;
            }
        };
        self.notifier.spawn_send(
            recipient.email,
            sender.display_name,
            sender.email,
            body.to_string(),
        );
    }

    fn broadcast_presence(&self, transition: PresenceTransition) {
        let event = if transition.online {
            ServerEvent::UserOnline {
                user_id: transition.user_id,
            }
        } else {
            ServerEvent::UserOffline {
                user_id: transition.user_id,
                last_seen_at: transition.last_seen_at,
            }
        };
        self.registry.broadcast(event);
    }
}
