//! Per-second countdowns on monotonic time

use curfew_util::MonotonicInstant;
use std::time::Duration;

const STEP: Duration = Duration::from_secs(1);

/// Length of the final warning before a blocked app is closed
pub const FINAL_COUNTDOWN_SECONDS: u64 = 10;

/// Length of the shutdown sequence
pub const SHUTDOWN_COUNTDOWN_SECONDS: u64 = 60;

/// A countdown that steps once per second until it reaches zero
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown<T> {
    target: T,
    remaining: u64,
    next_step: MonotonicInstant,
}

impl<T> Countdown<T> {
    pub fn start(target: T, seconds: u64, now_mono: MonotonicInstant) -> Self {
        Self {
            target,
            remaining: seconds,
            next_step: now_mono + STEP,
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn next_step(&self) -> MonotonicInstant {
        self.next_step
    }

    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }

    /// Take one step if it is due, returning the new remaining seconds.
    ///
    /// Steps are anchored to the start instant, so a late wakeup is caught
    /// up by calling this repeatedly rather than drifting.
    pub fn step_if_due(&mut self, now_mono: MonotonicInstant) -> Option<u64> {
        if self.remaining == 0 || now_mono < self.next_step {
            return None;
        }
        self.remaining -= 1;
        self.next_step = self.next_step + STEP;
        Some(self.remaining)
    }
}
