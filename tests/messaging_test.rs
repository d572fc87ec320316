//! End-to-end scenarios over the wired messaging core: conversation
//! resolution, realtime delivery, presence, typing and notification
//! fan-out, driven the way a transport layer would drive the gateway.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

use renthaven_messaging::application::commands::{
    MarkReadCommand, ResolveConversationCommand, SendMessageCommand,
};
use renthaven_messaging::application::queries::{ConversationListQuery, MessageHistoryQuery};
use renthaven_messaging::config::AppConfig;
use renthaven_messaging::domain::model::{Credentials, UserProfile};
use renthaven_messaging::domain::repository::NotificationDispatcher;
use renthaven_messaging::infrastructure::directory::{
    InMemoryPropertyDirectory, InMemoryUserDirectory,
};
use renthaven_messaging::interface::events::{ClientEvent, ServerEvent};
use renthaven_messaging::interface::gateway::ClientSession;
use renthaven_messaging::{ApplicationContext, Collaborators, MessagingError, initialize};

#[derive(Default)]
struct RecordingDispatcher {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn send_inquiry_email(
        &self,
        to_email: &str,
        from_name: &str,
        _from_email: &str,
        _body: &str,
    ) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to_email.to_string(), from_name.to_string()));
        Ok(())
    }
}

struct TestEnv {
    context: ApplicationContext,
    dispatcher: Arc<RecordingDispatcher>,
}

async fn build_env(typing_expiry_ms: u64) -> TestEnv {
    let _ = tracing_subscriber::fmt::try_init();

    let users = Arc::new(InMemoryUserDirectory::new());
    for (id, name) in [("tenant-1", "Avery"), ("owner-1", "Blake"), ("tenant-2", "Casey")] {
        users
            .insert(UserProfile {
                id: id.to_string(),
                display_name: name.to_string(),
                avatar_url: None,
                email: format!("{id}@example.com"),
            })
            .await;
    }
    let properties = Arc::new(InMemoryPropertyDirectory::new());
    properties.insert("prop-1").await;

    let dispatcher = Arc::new(RecordingDispatcher::default());
    let mut config = AppConfig::default();
    config.messaging.typing_expiry_ms = typing_expiry_ms;

    let context = initialize(
        &config,
        Collaborators {
            users,
            properties,
            dispatcher: Arc::new(NoopWrapper(dispatcher.clone())),
            authenticator: None,
        },
    )
    .expect("wiring failed");

    TestEnv {
        context,
        dispatcher,
    }
}

// Arc<RecordingDispatcher> needs to live on both sides; the wrapper keeps
// the recording handle out of the trait object.
struct NoopWrapper(Arc<RecordingDispatcher>);

#[async_trait]
impl NotificationDispatcher for NoopWrapper {
    async fn send_inquiry_email(
        &self,
        to_email: &str,
        from_name: &str,
        from_email: &str,
        body: &str,
    ) -> Result<()> {
        self.0
            .send_inquiry_email(to_email, from_name, from_email, body)
            .await
    }
}

async fn connect(env: &TestEnv, user_id: &str) -> ClientSession {
    env.context
        .gateway
        .connect(Credentials {
            user_id: user_id.to_string(),
            token: "valid-token".to_string(),
        })
        .await
        .expect("connect failed")
}

/// Drain events until one matches, within a deadline.
async fn expect_event<F>(events: &mut UnboundedReceiver<ServerEvent>, mut matches: F) -> ServerEvent
where
    F: FnMut(&ServerEvent) -> bool,
{
    timeout(Duration::from_secs(2), async {
        loop {
            let event = events.recv().await.expect("event stream closed");
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn tenant_owner_inquiry_scenario() {
    let env = build_env(2_000).await;

    // A (tenant) and B (owner) around property P.
    let mut tenant = connect(&env, "tenant-1").await;
    let mut owner = connect(&env, "owner-1").await;

    let conversation = env
        .context
        .commands
        .resolve_conversation(ResolveConversationCommand {
            initiator_id: "tenant-1".to_string(),
            peer_id: "owner-1".to_string(),
            property_id: Some("prop-1".to_string()),
        })
        .await
        .unwrap();

    for session in [&tenant, &owner] {
        env.context
            .gateway
            .handle_event(
                &session.connection_id,
                ClientEvent::JoinConversation {
                    conversation_id: conversation.id.clone(),
                },
            )
            .await;
    }

    env.context
        .gateway
        .handle_event(
            &tenant.connection_id,
            ClientEvent::SendMessage {
                conversation_id: conversation.id.clone(),
                content: "Is this still available?".to_string(),
                message_type: Default::default(),
                attachments: Vec::new(),
            },
        )
        .await;

    // Both room members receive the message, the sender included.
    let received = expect_event(&mut owner.events, |e| {
        matches!(e, ServerEvent::ReceiveMessage { .. })
    })
    .await;
    match received {
        ServerEvent::ReceiveMessage { message } => {
            assert_eq!(message.content, "Is this still available?");
            assert_eq!(message.sequence, 1);
        }
        _ => unreachable!(),
    }
    expect_event(&mut tenant.events, |e| {
        matches!(e, ServerEvent::ReceiveMessage { .. })
    })
    .await;

    // Owner's unread is 1, then 0 after mark-read.
    let list = env
        .context
        .queries
        .conversation_list(ConversationListQuery {
            user_id: "owner-1".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].unread_count, 1);

    env.context
        .commands
        .mark_read(MarkReadCommand {
            conversation_id: conversation.id.clone(),
            user_id: "owner-1".to_string(),
        })
        .await
        .unwrap();
    let list = env
        .context
        .queries
        .conversation_list(ConversationListQuery {
            user_id: "owner-1".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(list[0].unread_count, 0);

    // Both sides resolve the same pair/property concurrently: one row.
    let commands = env.context.commands.clone();
    let a = tokio::spawn({
        let commands = commands.clone();
        async move {
            commands
                .resolve_conversation(ResolveConversationCommand {
                    initiator_id: "tenant-1".to_string(),
                    peer_id: "owner-1".to_string(),
                    property_id: Some("prop-1".to_string()),
                })
                .await
                .unwrap()
        }
    });
    let b = tokio::spawn(async move {
        commands
            .resolve_conversation(ResolveConversationCommand {
                initiator_id: "owner-1".to_string(),
                peer_id: "tenant-1".to_string(),
                property_id: Some("prop-1".to_string()),
            })
            .await
            .unwrap()
    });
    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    assert_eq!(a.id, conversation.id);
    assert_eq!(b.id, conversation.id);
}

#[tokio::test]
async fn presence_broadcasts_on_edges_only() {
    let env = build_env(2_000).await;
    let mut watcher = connect(&env, "tenant-2").await;

    let owner_tab1 = connect(&env, "owner-1").await;
    expect_event(&mut watcher.events, |e| {
        matches!(e, ServerEvent::UserOnline { user_id } if user_id == "owner-1")
    })
    .await;

    // Second tab: no additional online broadcast; closing it leaves the
    // user online.
    let owner_tab2 = connect(&env, "owner-1").await;
    env.context.gateway.disconnect(&owner_tab2.connection_id).await;
    assert!(env.context.presence.is_online("owner-1").await);

    env.context.gateway.disconnect(&owner_tab1.connection_id).await;
    let offline = expect_event(&mut watcher.events, |e| {
        matches!(e, ServerEvent::UserOffline { user_id, .. } if user_id == "owner-1")
    })
    .await;
    match offline {
        ServerEvent::UserOffline { last_seen_at, .. } => assert!(last_seen_at.is_some()),
        _ => unreachable!(),
    }
    assert!(!env.context.presence.is_online("owner-1").await);

    // Double disconnect is a no-op.
    env.context.gateway.disconnect(&owner_tab1.connection_id).await;
}

#[tokio::test]
async fn offline_recipient_gets_an_email() {
    let env = build_env(2_000).await;
    let tenant = connect(&env, "tenant-1").await;

    let conversation = env
        .context
        .commands
        .resolve_conversation(ResolveConversationCommand {
            initiator_id: "tenant-1".to_string(),
            peer_id: "owner-1".to_string(),
            property_id: None,
        })
        .await
        .unwrap();
    env.context
        .gateway
        .handle_event(
            &tenant.connection_id,
            ClientEvent::JoinConversation {
                conversation_id: conversation.id.clone(),
            },
        )
        .await;
    env.context
        .gateway
        .handle_event(
            &tenant.connection_id,
            ClientEvent::SendMessage {
                conversation_id: conversation.id.clone(),
                content: "Anyone home?".to_string(),
                message_type: Default::default(),
                attachments: Vec::new(),
            },
        )
        .await;

    // Delivery is spawned; give it a beat.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let sent = env.dispatcher.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "owner-1@example.com");
    assert_eq!(sent[0].1, "Avery");
}

#[tokio::test]
async fn online_recipient_gets_no_email() {
    let env = build_env(2_000).await;
    let tenant = connect(&env, "tenant-1").await;
    let _owner = connect(&env, "owner-1").await;

    let conversation = env
        .context
        .commands
        .resolve_conversation(ResolveConversationCommand {
            initiator_id: "tenant-1".to_string(),
            peer_id: "owner-1".to_string(),
            property_id: None,
        })
        .await
        .unwrap();
    env.context
        .gateway
        .handle_event(
            &tenant.connection_id,
            ClientEvent::JoinConversation {
                conversation_id: conversation.id.clone(),
            },
        )
        .await;
    env.context
        .gateway
        .handle_event(
            &tenant.connection_id,
            ClientEvent::SendMessage {
                conversation_id: conversation.id.clone(),
                content: "hello".to_string(),
                message_type: Default::default(),
                attachments: Vec::new(),
            },
        )
        .await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(env.dispatcher.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn typing_relays_and_auto_expires() {
    let env = build_env(120).await;
    let tenant = connect(&env, "tenant-1").await;
    let mut owner = connect(&env, "owner-1").await;

    let conversation = env
        .context
        .commands
        .resolve_conversation(ResolveConversationCommand {
            initiator_id: "tenant-1".to_string(),
            peer_id: "owner-1".to_string(),
            property_id: None,
        })
        .await
        .unwrap();
    for session in [&tenant, &owner] {
        env.context
            .gateway
            .handle_event(
                &session.connection_id,
                ClientEvent::JoinConversation {
                    conversation_id: conversation.id.clone(),
                },
            )
            .await;
    }

    env.context
        .gateway
        .handle_event(
            &tenant.connection_id,
            ClientEvent::Typing {
                conversation_id: conversation.id.clone(),
            },
        )
        .await;

    expect_event(&mut owner.events, |e| {
        matches!(e, ServerEvent::UserTyping { user_id, .. } if user_id == "tenant-1")
    })
    .await;
    // No explicit stop: the expiry fires it.
    expect_event(&mut owner.events, |e| {
        matches!(e, ServerEvent::UserStopTyping { user_id, .. } if user_id == "tenant-1")
    })
    .await;
}

#[tokio::test]
async fn non_participant_is_rejected() {
    let env = build_env(2_000).await;
    let mut outsider = connect(&env, "tenant-2").await;

    let conversation = env
        .context
        .commands
        .resolve_conversation(ResolveConversationCommand {
            initiator_id: "tenant-1".to_string(),
            peer_id: "owner-1".to_string(),
            property_id: None,
        })
        .await
        .unwrap();

    env.context
        .gateway
        .handle_event(
            &outsider.connection_id,
            ClientEvent::JoinConversation {
                conversation_id: conversation.id.clone(),
            },
        )
        .await;
    let error = expect_event(&mut outsider.events, |e| {
        matches!(e, ServerEvent::Error { .. })
    })
    .await;
    match error {
        ServerEvent::Error { code, .. } => assert_eq!(code, "authorization_error"),
        _ => unreachable!(),
    }

    // The REST surface rejects the same way, with nothing mutated.
    let err = env
        .context
        .queries
        .message_history(MessageHistoryQuery {
            conversation_id: conversation.id.clone(),
            user_id: "tenant-2".to_string(),
            after_sequence: None,
            limit: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, MessagingError::Authorization(_)));
}

#[tokio::test]
async fn validation_failures_mutate_nothing() {
    let env = build_env(2_000).await;

    // Self-pairing.
    let err = env
        .context
        .commands
        .resolve_conversation(ResolveConversationCommand {
            initiator_id: "tenant-1".to_string(),
            peer_id: "tenant-1".to_string(),
            property_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, MessagingError::Validation(_)));

    // Unknown participant.
    let err = env
        .context
        .commands
        .resolve_conversation(ResolveConversationCommand {
            initiator_id: "tenant-1".to_string(),
            peer_id: "nobody".to_string(),
            property_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, MessagingError::NotFound(_)));

    // Empty message with no attachments.
    let conversation = env
        .context
        .commands
        .resolve_conversation(ResolveConversationCommand {
            initiator_id: "tenant-1".to_string(),
            peer_id: "owner-1".to_string(),
            property_id: None,
        })
        .await
        .unwrap();
    let err = env
        .context
        .commands
        .send_message(SendMessageCommand {
            conversation_id: conversation.id.clone(),
            sender_id: "tenant-1".to_string(),
            content: "   ".to_string(),
            message_type: Default::default(),
            attachments: Vec::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, MessagingError::Validation(_)));

    let history = env
        .context
        .queries
        .message_history(MessageHistoryQuery {
            conversation_id: conversation.id,
            user_id: "tenant-1".to_string(),
            after_sequence: None,
            limit: None,
        })
        .await
        .unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn multi_tab_sender_sees_its_own_message() {
    let env = build_env(2_000).await;
    let tab1 = connect(&env, "tenant-1").await;
    let mut tab2 = connect(&env, "tenant-1").await;

    let conversation = env
        .context
        .commands
        .resolve_conversation(ResolveConversationCommand {
            initiator_id: "tenant-1".to_string(),
            peer_id: "owner-1".to_string(),
            property_id: None,
        })
        .await
        .unwrap();
    for session in [&tab1, &tab2] {
        env.context
            .gateway
            .handle_event(
                &session.connection_id,
                ClientEvent::JoinConversation {
                    conversation_id: conversation.id.clone(),
                },
            )
            .await;
    }

    env.context
        .gateway
        .handle_event(
            &tab1.connection_id,
            ClientEvent::SendMessage {
                conversation_id: conversation.id.clone(),
                content: "from tab one".to_string(),
                message_type: Default::default(),
                attachments: Vec::new(),
            },
        )
        .await;

    let event = expect_event(&mut tab2.events, |e| {
        matches!(e, ServerEvent::ReceiveMessage { .. })
    })
    .await;
    match event {
        ServerEvent::ReceiveMessage { message } => assert_eq!(message.content, "from tab one"),
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn conversation_list_puts_unread_threads_before_more_recent_read_ones() {
    let env = build_env(2_000).await;
    let commands = &env.context.commands;
    let queries = &env.context.queries;

    let with_avery = commands
        .resolve_conversation(ResolveConversationCommand {
            initiator_id: "tenant-1".to_string(),
            peer_id: "owner-1".to_string(),
            property_id: Some("prop-1".to_string()),
        })
        .await
        .unwrap();
    let with_casey = commands
        .resolve_conversation(ResolveConversationCommand {
            initiator_id: "tenant-2".to_string(),
            peer_id: "owner-1".to_string(),
            property_id: None,
        })
        .await
        .unwrap();

    // An older message the owner has not read yet...
    commands
        .send_message(SendMessageCommand {
            conversation_id: with_avery.id.clone(),
            sender_id: "tenant-1".to_string(),
            content: "are pets allowed?".to_string(),
            message_type: Default::default(),
            attachments: Vec::new(),
        })
        .await
        .unwrap();
    // ...then a newer thread the owner has already caught up on.
    commands
        .send_message(SendMessageCommand {
            conversation_id: with_casey.id.clone(),
            sender_id: "tenant-2".to_string(),
            content: "rent sent, please confirm".to_string(),
            message_type: Default::default(),
            attachments: Vec::new(),
        })
        .await
        .unwrap();
    commands
        .mark_read(MarkReadCommand {
            conversation_id: with_casey.id.clone(),
            user_id: "owner-1".to_string(),
        })
        .await
        .unwrap();

    // Unread wins over recency.
    let list = queries
        .conversation_list(ConversationListQuery {
            user_id: "owner-1".to_string(),
        })
        .await
        .unwrap();
    let ids: Vec<&str> = list.iter().map(|s| s.conversation_id.as_str()).collect();
    assert_eq!(ids, [with_avery.id.as_str(), with_casey.id.as_str()]);
    assert_eq!(list[0].unread_count, 1);
    assert_eq!(list[1].unread_count, 0);

    // With everything read, recency decides.
    commands
        .mark_read(MarkReadCommand {
            conversation_id: with_avery.id.clone(),
            user_id: "owner-1".to_string(),
        })
        .await
        .unwrap();
    let list = queries
        .conversation_list(ConversationListQuery {
            user_id: "owner-1".to_string(),
        })
        .await
        .unwrap();
    let ids: Vec<&str> = list.iter().map(|s| s.conversation_id.as_str()).collect();
    assert_eq!(ids, [with_casey.id.as_str(), with_avery.id.as_str()]);
}
