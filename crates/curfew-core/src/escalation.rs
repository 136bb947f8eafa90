//! Per-app warning escalation

use curfew_api::WarningRecordView;
use curfew_util::MonotonicInstant;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Warning history for one app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppWarningRecord {
    pub warning_count: u32,
    pub last_warning_at: MonotonicInstant,
    pub countdown_active: bool,
}

/// What the engine should do after observing a blocked app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationStep {
    /// Show a standard warning. `first` is set for a new block session.
    Warn { count: u32, max: u32, first: bool },
    /// Focus came back to an app with earlier warnings; repeat its count
    /// without adding one
    Resume { count: u32, max: u32 },
    /// The app reached its limit; start the final countdown
    FinalCountdown { count: u32 },
    /// Nothing to do this tick
    Hold,
}

/// Tracks which app is currently blocked and the warning history of every
/// app seen so far.
///
/// History outlives block sessions: switching away and back resumes the
/// count, and the interval keeps running from the last warning. Only a
/// completed termination clears an app's record.
#[derive(Debug, Default)]
pub struct EscalationMachine {
    records: HashMap<String, AppWarningRecord>,
    current: Option<String>,
}

impl EscalationMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The app of the current block session
    pub fn current_app(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn record(&self, app: &str) -> Option<&AppWarningRecord> {
        self.records.get(app)
    }

    /// Feed one tick on which `app` was classified as blocked
    pub fn observe_blocked(
        &mut self,
        app: &str,
        now_mono: MonotonicInstant,
        warning_interval: Duration,
        max_warnings: u32,
    ) -> EscalationStep {
        let new_session = self.current.as_deref() != Some(app);
        if new_session {
            self.release();
            self.current = Some(app.to_string());
        }

        let record = self
            .records
            .entry(app.to_string())
            .or_insert_with(|| AppWarningRecord {
                warning_count: 0,
                last_warning_at: now_mono,
                countdown_active: false,
            });

        if new_session && record.warning_count >= max_warnings {
            // Left during the countdown; it starts over on return
            record.countdown_active = true;
            return EscalationStep::FinalCountdown {
                count: record.warning_count,
            };
        } else if new_session && record.warning_count > 0 {
            return EscalationStep::Resume {
                count: record.warning_count,
                max: max_warnings,
            };
        } else if !new_session
            && (record.countdown_active
                || now_mono.duration_since(record.last_warning_at) < warning_interval)
        {
            return EscalationStep::Hold;
        }

        record.warning_count += 1;
        record.last_warning_at = now_mono;

        debug!(
            app,
            count = record.warning_count,
            max = max_warnings,
            new_session,
            "Escalating"
        );

        if record.warning_count >= max_warnings {
            record.countdown_active = true;
            EscalationStep::FinalCountdown {
                count: record.warning_count,
            }
        } else {
            EscalationStep::Warn {
                count: record.warning_count,
                max: max_warnings,
                first: new_session,
            }
        }
    }

    /// End the current block session without touching history.
    /// Returns the app that was being tracked.
    pub fn release(&mut self) -> Option<String> {
        let app = self.current.take()?;
        if let Some(record) = self.records.get_mut(&app) {
            record.countdown_active = false;
        }
        Some(app)
    }

    /// The app was closed after its final countdown
    pub fn complete_termination(&mut self, app: &str) {
        self.records.remove(app);
        if self.current.as_deref() == Some(app) {
            self.current = None;
        }
    }

    /// Records sorted by app key
    pub fn views(&self) -> Vec<WarningRecordView> {
        let mut views: Vec<_> = self
            .records
            .iter()
            .map(|(app, record)| WarningRecordView {
                app: app.clone(),
                warning_count: record.warning_count,
                countdown_active: record.countdown_active,
            })
            .collect();
        views.sort_by(|a, b| a.app.cmp(&b.app));
        views
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(10);

    #[test]
    fn new_session_warns_immediately() {
        let mut machine = EscalationMachine::new();
        let t0 = MonotonicInstant::now();

        assert_eq!(
            machine.observe_blocked("steam", t0, INTERVAL, 3),
            EscalationStep::Warn { count: 1, max: 3, first: true }
        );
        assert_eq!(machine.current_app(), Some("steam"));
    }

    #[test]
    fn same_app_waits_for_interval() {
        let mut machine = EscalationMachine::new();
        let t0 = MonotonicInstant::now();
        machine.observe_blocked("steam", t0, INTERVAL, 3);

        assert_eq!(
            machine.observe_blocked("steam", t0 + Duration::from_secs(7), INTERVAL, 3),
            EscalationStep::Hold
        );
        assert_eq!(
            machine.observe_blocked("steam", t0 + Duration::from_secs(10), INTERVAL, 3),
            EscalationStep::Warn { count: 2, max: 3, first: false }
        );
        // Interval restarts from the last warning
        assert_eq!(
            machine.observe_blocked("steam", t0 + Duration::from_secs(14), INTERVAL, 3),
            EscalationStep::Hold
        );
        assert_eq!(
            machine.observe_blocked("steam", t0 + Duration::from_secs(20), INTERVAL, 3),
            EscalationStep::FinalCountdown { count: 3 }
        );
        assert!(machine.record("steam").unwrap().countdown_active);

        // No further escalation while the countdown runs
        assert_eq!(
            machine.observe_blocked("steam", t0 + Duration::from_secs(40), INTERVAL, 3),
            EscalationStep::Hold
        );
    }

    #[test]
    fn history_survives_release() {
        let mut machine = EscalationMachine::new();
        let t0 = MonotonicInstant::now();
        machine.observe_blocked("steam", t0, INTERVAL, 3);
        machine.observe_blocked("steam", t0 + INTERVAL, INTERVAL, 3);

        assert_eq!(machine.release().as_deref(), Some("steam"));
        assert_eq!(machine.current_app(), None);
        assert_eq!(machine.record("steam").unwrap().warning_count, 2);

        // Coming back repeats the count, then escalates on the old interval
        assert_eq!(
            machine.observe_blocked("steam", t0 + Duration::from_secs(12), INTERVAL, 3),
            EscalationStep::Resume { count: 2, max: 3 }
        );
        assert_eq!(machine.current_app(), Some("steam"));
        assert_eq!(
            machine.observe_blocked("steam", t0 + Duration::from_secs(15), INTERVAL, 3),
            EscalationStep::Hold
        );
        assert_eq!(
            machine.observe_blocked("steam", t0 + Duration::from_secs(20), INTERVAL, 3),
            EscalationStep::FinalCountdown { count: 3 }
        );
    }

    #[test]
    fn return_at_limit_restarts_countdown() {
        let mut machine = EscalationMachine::new();
        let t0 = MonotonicInstant::now();
        machine.observe_blocked("steam", t0, INTERVAL, 1);
        machine.release();

        assert_eq!(
            machine.observe_blocked("steam", t0 + Duration::from_secs(3), INTERVAL, 1),
            EscalationStep::FinalCountdown { count: 1 }
        );
        let record = machine.record("steam").unwrap();
        assert_eq!(record.warning_count, 1);
        assert!(record.countdown_active);
    }

    #[test]
    fn release_clears_countdown_flag() {
        let mut machine = EscalationMachine::new();
        let t0 = MonotonicInstant::now();
        machine.observe_blocked("steam", t0, INTERVAL, 1);
        assert!(machine.record("steam").unwrap().countdown_active);

        machine.release();
        assert!(!machine.record("steam").unwrap().countdown_active);
        assert_eq!(machine.release(), None);
    }

    #[test]
    fn termination_clears_record() {
        let mut machine = EscalationMachine::new();
        let t0 = MonotonicInstant::now();
        machine.observe_blocked("steam", t0, INTERVAL, 1);
        machine.observe_blocked("lutris", t0, INTERVAL, 3);

        machine.complete_termination("steam");
        assert!(machine.record("steam").is_none());
        assert_eq!(machine.current_app(), Some("lutris"));

        let views = machine.views();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].app, "lutris");
    }
}
