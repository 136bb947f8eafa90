//! Protocol types for curfewd IPC
//!
//! This crate defines the stable API between curfewd and its clients
//! (overlay, dashboard, admin tools):
//! - Commands (requests from clients)
//! - Responses
//! - Events (daemon -> clients), including overlay display intents
//! - Shared types such as the foreground window snapshot

mod commands;
mod events;
mod types;

pub use commands::*;
pub use events::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
