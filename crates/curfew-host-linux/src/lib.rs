//! Linux host adapter for curfewd
//!
//! Provides:
//! - Focused window lookup via `xdotool` and `/proc`
//! - Forceful (SIGKILL) termination by executable name
//! - System power off via systemd, with a `shutdown` fallback

mod adapter;
mod process;
mod window;

pub use adapter::*;
pub use process::*;
pub use window::*;
