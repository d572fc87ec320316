//! RentHaven messaging core.
//!
//! The stateful heart of the rental marketplace's chat: conversation
//! resolution between a tenant/owner pair, ordered message append with
//! unread bookkeeping, live presence across multiple tabs and devices,
//! typing indicators with auto-expiry, and a room-multicast realtime
//! gateway. Domain CRUD, identity, listings and email delivery are
//! external collaborators reached through the traits in
//! [`domain::repository`].

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interface;
pub mod logging;
pub mod service;

pub use config::AppConfig;
pub use error::{MessagingError, Result, StoreError};
pub use service::{ApplicationContext, Collaborators, initialize};
