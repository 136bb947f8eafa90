//! Daily shutdown triggers

use chrono::{DateTime, Local};
use curfew_api::{ScheduledJobView, Severity, ShutdownTrigger};
use curfew_config::Policy;
use curfew_util::WallClock;
use tracing::{info, warn};

use crate::CoreEvent;

/// How late a job may still fire. Anything later (suspend, stalled loop)
/// is skipped and re-armed instead of powering off at the wrong time.
pub const MISSED_FIRE_GRACE_SECS: i64 = 60;

/// An armed daily job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub trigger: ShutdownTrigger,
    pub at: WallClock,
    pub next_fire: DateTime<Local>,
}

/// The two daily shutdown triggers.
///
/// Jobs are rebuilt from scratch on every configuration change, so a
/// reload never leaves a stale job armed next to its replacement.
#[derive(Debug, Default)]
pub struct Scheduler {
    jobs: Vec<ScheduledJob>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every job and arm the ones the policy enables
    pub fn rearm(&mut self, policy: &Policy, now: &DateTime<Local>) -> Vec<CoreEvent> {
        self.jobs.clear();
        let mut events = Vec::new();

        if let Some(window) = &policy.active_window
            && window.enabled
            && window.shutdown_at_end
        {
            let at = window.window.end;
            self.arm(ShutdownTrigger::EndOfWindow, at, now);
            events.push(CoreEvent::notice(
                format!("Scheduled shutdown for {}", at),
                Severity::Info,
            ));
        }

        if let Some(scheduled) = &policy.scheduled_shutdown
            && scheduled.enabled
        {
            match scheduled.at() {
                Ok(at) => {
                    self.arm(ShutdownTrigger::Daily, at, now);
                    events.push(CoreEvent::notice(
                        format!("Daily shutdown scheduled for {}", at),
                        Severity::Info,
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "Daily shutdown not armed");
                    events.push(CoreEvent::notice(
                        format!("Daily shutdown not scheduled: {}", e),
                        Severity::Error,
                    ));
                }
            }
        }

        events
    }

    fn arm(&mut self, trigger: ShutdownTrigger, at: WallClock, now: &DateTime<Local>) {
        let next_fire = at.next_occurrence_after(now);
        info!(?trigger, %at, next_fire = %next_fire, "Shutdown job armed");
        self.jobs.push(ScheduledJob {
            trigger,
            at,
            next_fire,
        });
    }

    pub fn cancel_all(&mut self) {
        self.jobs.clear();
    }

    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }

    /// Earliest pending firing
    pub fn next_fire(&self) -> Option<DateTime<Local>> {
        self.jobs.iter().map(|job| job.next_fire).min()
    }

    /// Triggers whose time has come. Each fired job is re-armed for its
    /// next daily occurrence; a job more than [`MISSED_FIRE_GRACE_SECS`] late is
    /// re-armed without firing.
    pub fn take_due(&mut self, now: &DateTime<Local>) -> Vec<ShutdownTrigger> {
        let mut due = Vec::new();
        for job in &mut self.jobs {
            if job.next_fire > *now {
                continue;
            }
            let late = *now - job.next_fire;
            if late > chrono::Duration::seconds(MISSED_FIRE_GRACE_SECS) {
                warn!(
                    trigger = ?job.trigger,
                    missed = %job.next_fire,
                    late_secs = late.num_seconds(),
                    "Missed shutdown job, not firing late"
                );
            } else {
                due.push(job.trigger);
            }
            job.next_fire = job.at.next_occurrence_after(now);
        }
        due
    }

    pub fn views(&self) -> Vec<ScheduledJobView> {
        self.jobs
            .iter()
            .map(|job| ScheduledJobView {
                trigger: job.trigger,
                at: job.at,
                next_fire: job.next_fire,
            })
            .collect()
    }
}
