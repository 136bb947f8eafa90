//! Host adapter trait interfaces for curfewd
//!
//! This crate defines the interface between the enforcement engine and
//! platform-specific implementations: reading the foreground window,
//! terminating processes, and powering the machine off. It contains no
//! platform code itself.

mod mock;
mod retry;
mod traits;

pub use mock::*;
pub use retry::*;
pub use traits::*;
