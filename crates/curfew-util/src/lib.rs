//! Shared utilities for curfew
//!
//! This crate provides:
//! - Time utilities (wall clock, monotonic time, the active-window check)
//! - The shared error taxonomy
//! - Client ID type for IPC
//! - Default paths for the config file and socket

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
