//! Enforcement engine for curfewd
//!
//! This crate is the heart of curfewd, containing:
//! - Foreground window classification (whitelist, keywords, blocklist)
//! - Per-app escalation (warnings -> final countdown -> termination)
//! - Daily shutdown scheduling and the shutdown countdown
//! - The poll orchestrator tying them together on injected time
//!
//! Nothing here performs I/O. The engine returns [`CoreEvent`]s and the
//! daemon carries them out.

mod classify;
mod countdown;
mod engine;
mod escalation;
mod events;
mod scheduler;

pub use classify::*;
pub use countdown::*;
pub use engine::*;
pub use escalation::*;
pub use events::*;
pub use scheduler::*;
