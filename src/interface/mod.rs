pub mod events;
pub mod gateway;
pub mod rooms;

pub use events::{ClientEvent, ServerEvent};
pub use gateway::{ClientSession, RealtimeGateway};
pub use rooms::RoomRegistry;
