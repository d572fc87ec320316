//! Wire-style dependency construction.
//!
//! Builds the full object graph in dependency order and hands back an
//! `ApplicationContext`. Collaborator implementations (user directory,
//! property service, mail dispatcher, authenticator) are injected; the
//! stores, trackers and handlers are constructed here.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::application::{MessagingCommandHandler, MessagingQueryHandler};
use crate::config::AppConfig;
use crate::domain::repository::{
    Authenticator, NotificationDispatcher, PropertyDirectory, UserDirectory,
};
use crate::domain::service::{
    ConversationService, MessageService, PresenceService, StoreRetryPolicy, TypingService,
};
use crate::infrastructure::directory::DirectoryAuthenticator;
use crate::infrastructure::notification::RetryingNotifier;
use crate::infrastructure::persistence::MemoryStore;
use crate::interface::gateway::RealtimeGateway;
use crate::interface::rooms::RoomRegistry;

/// External collaborators the messaging core consumes but does not own.
pub struct Collaborators {
    pub users: Arc<dyn UserDirectory>,
    pub properties: Arc<dyn PropertyDirectory>,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
    /// Defaults to a directory-backed authenticator when not provided.
    pub authenticator: Option<Arc<dyn Authenticator>>,
}

/// The fully wired messaging core.
pub struct ApplicationContext {
    pub gateway: Arc<RealtimeGateway>,
    pub commands: Arc<MessagingCommandHandler>,
    pub queries: Arc<MessagingQueryHandler>,
    pub presence: Arc<PresenceService>,
    pub registry: Arc<RoomRegistry>,
}

/// Construct all components in dependency order, leaves first.
pub fn initialize(config: &AppConfig, collaborators: Collaborators) -> Result<ApplicationContext> {
    let messaging = &config.messaging;

    // Stores and trackers.
    let store = Arc::new(MemoryStore::new());
    let registry = Arc::new(RoomRegistry::new());
    let presence = Arc::new(PresenceService::new());
    let typing = Arc::new(TypingService::new(
        registry.clone(),
        Duration::from_millis(messaging.typing_expiry_ms),
    ));

    // Domain services.
    let retry = StoreRetryPolicy::new(
        messaging.conflict_retry_limit,
        Duration::from_millis(messaging.store_retry_backoff_ms),
    );
    let conversations = Arc::new(ConversationService::new(
        store.clone(),
        collaborators.users.clone(),
        collaborators.properties.clone(),
        retry,
    ));
    let messages = Arc::new(MessageService::new(
        store.clone(),
        store.clone(),
        messaging.history_page_size,
        retry,
    ));

    // Outbound side effects.
    let notifier = Arc::new(RetryingNotifier::new(
        collaborators.dispatcher,
        messaging.notify_max_attempts,
        Duration::from_millis(messaging.notify_backoff_ms),
    ));
    let authenticator = collaborators.authenticator.unwrap_or_else(|| {
        Arc::new(DirectoryAuthenticator::new(collaborators.users.clone()))
    });

    // Interface and application layers.
    let gateway = Arc::new(RealtimeGateway::new(
        registry.clone(),
        presence.clone(),
        typing,
        conversations.clone(),
        messages.clone(),
        collaborators.users,
        authenticator,
        notifier,
    ));
    let commands = Arc::new(MessagingCommandHandler::new(
        conversations.clone(),
        messages.clone(),
    ));
    let queries = Arc::new(MessagingQueryHandler::new(
        conversations,
        messages,
        presence.clone(),
    ));

    Ok(ApplicationContext {
        gateway,
        commands,
        queries,
        presence,
        registry,
    })
}
