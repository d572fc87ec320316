pub mod conversation_service;
pub mod message_service;
pub mod presence_service;
pub mod store_retry;
pub mod typing_service;

pub use conversation_service::ConversationService;
pub use message_service::MessageService;
pub use presence_service::PresenceService;
pub use store_retry::StoreRetryPolicy;
pub use typing_service::{TypingEvent, TypingEventSink, TypingService};
