//! Poll orchestrator and timer slots

use chrono::{DateTime, Local};
use curfew_api::{
    CountdownView, DisplayExtra, DisplayIntent, DisplayMode, EngineStatus, ForegroundWindow,
    ObservedState, Severity, ShutdownTrigger, API_VERSION,
};
use curfew_config::{ActiveWindowPolicy, Policy};
use curfew_util::{CurfewError, MonotonicInstant};
use tracing::{debug, info};

use crate::{
    classify, Countdown, CoreEvent, EscalationMachine, EscalationStep, Scheduler, Verdict,
    FINAL_COUNTDOWN_SECONDS, SHUTDOWN_COUNTDOWN_SECONDS,
};

const WARNING_TITLE: &str = "Restricted App Detected";
const FINAL_WARNING_TITLE: &str = "FINAL WARNING";

/// Outcome of the first half of a poll tick
#[derive(Debug)]
pub enum PollPlan {
    /// Nothing to query this tick (monitoring off or outside the window)
    Skip(Vec<CoreEvent>),
    /// Query the foreground window and pass the result to
    /// [`Engine::finish_poll`]
    QueryWindow,
}

/// The enforcement engine.
///
/// Owns every timer slot: the poll tick, the final-warning countdown, the
/// shutdown countdown and the scheduler's daily jobs. Time is always passed
/// in; wall time drives the active window and daily jobs, monotonic time
/// drives everything else.
#[derive(Debug)]
pub struct Engine {
    running: bool,
    self_pid: Option<u32>,
    escalation: EscalationMachine,
    scheduler: Scheduler,
    next_poll: Option<MonotonicInstant>,
    final_countdown: Option<Countdown<String>>,
    shutdown_countdown: Option<Countdown<ShutdownTrigger>>,
    last_observed: Option<ObservedState>,
    last_query_error: Option<String>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            running: false,
            self_pid: None,
            escalation: EscalationMachine::new(),
            scheduler: Scheduler::new(),
            next_poll: None,
            final_countdown: None,
            shutdown_countdown: None,
            last_observed: None,
            last_query_error: None,
        }
    }

    /// Windows owned by this PID are never classified
    pub fn with_self_pid(mut self, pid: u32) -> Self {
        self.self_pid = Some(pid);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Arm the scheduler and schedule an immediate first poll
    pub fn start(
        &mut self,
        policy: &Policy,
        now: &DateTime<Local>,
        now_mono: MonotonicInstant,
    ) -> Vec<CoreEvent> {
        self.running = true;
        self.next_poll = Some(now_mono);

        info!(
            monitoring = policy.monitoring_enabled(),
            strict = policy.strict_mode,
            dry_run = policy.dry_run,
            "Engine started"
        );

        let mut events = vec![CoreEvent::notice(
            "Monitoring service started",
            Severity::Info,
        )];
        events.extend(self.scheduler.rearm(policy, now));
        events
    }

    /// Cancel every slot. Nothing fires after this.
    pub fn stop(&mut self) -> Vec<CoreEvent> {
        if !self.running {
            return Vec::new();
        }

        self.running = false;
        self.next_poll = None;
        self.final_countdown = None;
        self.shutdown_countdown = None;
        self.scheduler.cancel_all();
        self.escalation.release();
        self.last_observed = None;
        self.last_query_error = None;

        info!("Engine stopped");

        vec![
            CoreEvent::Display(DisplayIntent::Hide),
            CoreEvent::notice("Monitoring service stopped", Severity::Info),
        ]
    }

    /// Re-arm the scheduler for a new policy. The poll loop keeps its
    /// current deadline; the new check interval applies from the next tick.
    pub fn on_config_changed(&mut self, policy: &Policy, now: &DateTime<Local>) -> Vec<CoreEvent> {
        if !self.running {
            return Vec::new();
        }

        info!(
            monitoring = policy.monitoring_enabled(),
            strict = policy.strict_mode,
            "Policy changed"
        );

        let mut events = vec![CoreEvent::notice("Configuration reloaded", Severity::Info)];
        events.extend(self.scheduler.rearm(policy, now));
        events
    }

    /// Earliest instant at which [`Engine::fire_due`] or a poll has work
    pub fn next_deadline(
        &self,
        now: &DateTime<Local>,
        now_mono: MonotonicInstant,
    ) -> Option<MonotonicInstant> {
        if !self.running {
            return None;
        }

        let scheduled = self.scheduler.next_fire().map(|fire| {
            let until = (fire - *now).to_std().unwrap_or_default();
            now_mono + until
        });

        [
            self.next_poll,
            self.final_countdown.as_ref().map(Countdown::next_step),
            self.shutdown_countdown.as_ref().map(Countdown::next_step),
            scheduled,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    pub fn poll_due(&self, now_mono: MonotonicInstant) -> bool {
        self.running && self.next_poll.is_some_and(|at| now_mono >= at)
    }

    /// Service countdown steps and daily jobs that are due
    pub fn fire_due(
        &mut self,
        policy: &Policy,
        now: &DateTime<Local>,
        now_mono: MonotonicInstant,
    ) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        if !self.running {
            return events;
        }

        self.step_final_countdown(policy, now_mono, &mut events);

        for trigger in self.scheduler.take_due(now) {
            self.start_shutdown_sequence(trigger, now_mono, &mut events);
        }

        self.step_shutdown_countdown(policy, now_mono, &mut events);

        events
    }

    /// One full poll tick with an already-known query result.
    ///
    /// The daemon uses [`Engine::begin_poll`] and [`Engine::finish_poll`] so
    /// it only queries the host when needed; this is the same thing in one
    /// call.
    pub fn poll(
        &mut self,
        policy: &Policy,
        now: &DateTime<Local>,
        now_mono: MonotonicInstant,
        window: Result<Option<ForegroundWindow>, CurfewError>,
    ) -> Vec<CoreEvent> {
        match self.begin_poll(policy, now, now_mono) {
            PollPlan::Skip(events) => events,
            PollPlan::QueryWindow => self.finish_poll(policy, now_mono, window),
        }
    }

    /// First half of a tick: gate on the enabled flag and the active window
    pub fn begin_poll(
        &mut self,
        policy: &Policy,
        now: &DateTime<Local>,
        now_mono: MonotonicInstant,
    ) -> PollPlan {
        if !self.running {
            return PollPlan::Skip(Vec::new());
        }

        // Re-armed once the tick completes
        self.next_poll = None;

        let mut events = Vec::new();

        let Some(window) = policy.active_window.as_ref().filter(|w| w.enabled) else {
            self.release_session(&mut events);
            self.observe(
                ObservedState::Disabled,
                Some(("Monitoring disabled".to_string(), Severity::Info)),
                &mut events,
            );
            self.schedule_next_poll(policy, now_mono);
            return PollPlan::Skip(events);
        };

        if !window.window.contains(now) {
            self.release_session(&mut events);
            self.observe(
                ObservedState::OutsideWindow,
                Some((
                    format!("Outside active window ({}), enforcement paused", window.window),
                    Severity::Info,
                )),
                &mut events,
            );
            self.schedule_next_poll(policy, now_mono);
            return PollPlan::Skip(events);
        }

        PollPlan::QueryWindow
    }

    /// Second half of a tick: classify the query result and escalate.
    ///
    /// `now_mono` should be taken after the query returned; the next poll is
    /// scheduled one check interval from it.
    pub fn finish_poll(
        &mut self,
        policy: &Policy,
        now_mono: MonotonicInstant,
        window: Result<Option<ForegroundWindow>, CurfewError>,
    ) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        if !self.running {
            return events;
        }

        match (window, policy.active_window.as_ref()) {
            (_, None) => {}
            (Err(e), Some(_)) => self.observe_query_error(e, &mut events),
            (Ok(None), Some(_)) => {
                self.release_session(&mut events);
                self.observe(ObservedState::Neutral, None, &mut events);
            }
            (Ok(Some(window)), Some(active)) => {
                self.handle_window(policy, active, &window, now_mono, &mut events);
            }
        }

        self.schedule_next_poll(policy, now_mono);
        events
    }

    fn handle_window(
        &mut self,
        policy: &Policy,
        active: &ActiveWindowPolicy,
        window: &ForegroundWindow,
        now_mono: MonotonicInstant,
        events: &mut Vec<CoreEvent>,
    ) {
        let verdict = classify(window, &policy.rules, self.self_pid);
        debug!(
            app = %window.app_key(),
            title = %window.window_title,
            ?verdict,
            "Classified foreground window"
        );

        match &verdict {
            Verdict::Ignore => {}
            Verdict::Whitelisted => {
                self.release_session(events);
                self.observe(
                    ObservedState::Whitelisted,
                    Some((format!("Allowed: {}", window.window_title), Severity::Success)),
                    events,
                );
            }
            Verdict::AllowedByKeyword(keyword) => {
                self.release_session(events);
                self.observe(
                    ObservedState::Allowed,
                    Some((
                        format!("Allowed by keyword \"{}\": {}", keyword, window.window_title),
                        Severity::Success,
                    )),
                    events,
                );
            }
            Verdict::Neutral => {
                self.release_session(events);
                self.observe(
                    ObservedState::Neutral,
                    Some(("Unrestricted app".to_string(), Severity::Info)),
                    events,
                );
            }
            Verdict::Blocklisted | Verdict::BlockedByKeyword(_) => {
                let reason = verdict.block_reason().unwrap_or_default();
                let app = window.app_key();
                if policy.strict_mode {
                    self.enforce_strict(policy, &app, &reason, events);
                    self.observe(ObservedState::Blocked, None, events);
                } else {
                    self.escalate(policy, active, &app, &reason, now_mono, events);
                    let state = if self.final_countdown.is_some() {
                        ObservedState::Countdown
                    } else {
                        ObservedState::Blocked
                    };
                    self.observe(state, None, events);
                }
            }
        }
    }

    fn enforce_strict(
        &mut self,
        policy: &Policy,
        app: &str,
        reason: &str,
        events: &mut Vec<CoreEvent>,
    ) {
        if self.final_countdown.take().is_some() {
            events.push(CoreEvent::Display(DisplayIntent::Hide));
        }
        self.escalation.release();

        info!(app, reason, dry_run = policy.dry_run, "Strict mode block");
        events.push(CoreEvent::notice(
            format!("[STRICT] Blocking {}: {}", app, reason),
            Severity::Warning,
        ));

        if policy.dry_run {
            events.push(CoreEvent::notice(
                format!("[DRY RUN] Would immediately close {}", app),
                Severity::Success,
            ));
        } else {
            events.push(CoreEvent::notice(
                format!("Force closing {} (Strict Mode)", app),
                Severity::Warning,
            ));
            events.push(CoreEvent::TerminateApp {
                executable: app.to_string(),
            });
        }
    }

    fn escalate(
        &mut self,
        policy: &Policy,
        active: &ActiveWindowPolicy,
        app: &str,
        reason: &str,
        now_mono: MonotonicInstant,
        events: &mut Vec<CoreEvent>,
    ) {
        // A countdown for another app ends with its block session
        if self
            .final_countdown
            .as_ref()
            .is_some_and(|c| c.target() != app)
        {
            self.final_countdown = None;
        }

        let step = self.escalation.observe_blocked(
            app,
            now_mono,
            active.warning_interval,
            active.max_warnings,
        );

        match step {
            EscalationStep::Hold => {}
            EscalationStep::Warn { count, max, first } => {
                info!(app, reason, count, max, "Warning issued");
                let (log, message) = if first {
                    (
                        format!("Blocked {} ({}) - Warning {}/{}", app, reason, count, max),
                        format!(
                            "{} is blocked.\nReason: {}\n\nPlease close this application.",
                            app, reason
                        ),
                    )
                } else {
                    (
                        format!("{} - Warning {}/{}", app, count, max),
                        format!("{} is blocked.\nWarning {}/{}", app, count, max),
                    )
                };
                events.push(CoreEvent::notice(log, Severity::Warning));
                events.push(CoreEvent::Display(DisplayIntent::show(
                    WARNING_TITLE,
                    message,
                    false,
                )));
            }
            EscalationStep::Resume { count, max } => {
                info!(app, count, max, "Returned to blocked app");
                events.push(CoreEvent::notice(
                    format!("Returned to blocked app: {} (Warning {}/{})", app, count, max),
                    Severity::Warning,
                ));
                events.push(CoreEvent::Display(DisplayIntent::show(
                    WARNING_TITLE,
                    format!("{} is still blocked.\nWarning {}/{}", app, count, max),
                    false,
                )));
            }
            EscalationStep::FinalCountdown { count } => {
                info!(app, count, dry_run = policy.dry_run, "Final countdown started");
                events.push(CoreEvent::notice(
                    format!("FINAL WARNING: {} will be closed", app),
                    Severity::Warning,
                ));
                events.push(CoreEvent::Display(DisplayIntent::show(
                    FINAL_WARNING_TITLE,
                    format!("Closing {} in {} seconds!", app, FINAL_COUNTDOWN_SECONDS),
                    true,
                )));
                self.final_countdown = Some(Countdown::start(
                    app.to_string(),
                    FINAL_COUNTDOWN_SECONDS,
                    now_mono,
                ));
            }
        }
    }

    fn step_final_countdown(
        &mut self,
        policy: &Policy,
        now_mono: MonotonicInstant,
        events: &mut Vec<CoreEvent>,
    ) {
        loop {
            let Some(countdown) = self.final_countdown.as_mut() else {
                return;
            };
            let Some(remaining) = countdown.step_if_due(now_mono) else {
                return;
            };
            let app = countdown.target().clone();
            let finished = countdown.is_finished();

            events.push(CoreEvent::Display(DisplayIntent::update(
                FINAL_WARNING_TITLE,
                format!("Closing {} in {}s...", app, remaining),
                DisplayExtra {
                    mode: DisplayMode::Blocking,
                    timer_seconds: Some(remaining),
                    force_show: false,
                },
            )));

            if finished {
                self.final_countdown = None;
                self.expire_final_countdown(policy, &app, events);
                return;
            }
        }
    }

    fn expire_final_countdown(&mut self, policy: &Policy, app: &str, events: &mut Vec<CoreEvent>) {
        if policy.dry_run {
            info!(app, "Final countdown expired (dry run)");
            events.push(CoreEvent::notice(
                format!("[DRY RUN] Would close {}", app),
                Severity::Success,
            ));
        } else {
            info!(app, "Final countdown expired, closing");
            events.push(CoreEvent::notice(
                format!("Force closing {}", app),
                Severity::Warning,
            ));
            events.push(CoreEvent::TerminateApp {
                executable: app.to_string(),
            });
        }

        self.escalation.complete_termination(app);
        events.push(CoreEvent::Display(DisplayIntent::Hide));
    }

    fn start_shutdown_sequence(
        &mut self,
        trigger: ShutdownTrigger,
        now_mono: MonotonicInstant,
        events: &mut Vec<CoreEvent>,
    ) {
        let reason = trigger.reason();
        info!(?trigger, "Shutdown sequence started");

        events.push(CoreEvent::notice(
            format!("{}. Initiating Shutdown.", reason),
            Severity::Warning,
        ));
        events.push(CoreEvent::Display(DisplayIntent::update(
            reason,
            "",
            DisplayExtra {
                mode: DisplayMode::TimerOnly,
                timer_seconds: Some(SHUTDOWN_COUNTDOWN_SECONDS),
                force_show: true,
            },
        )));

        // Replaces any countdown already running
        self.shutdown_countdown = Some(Countdown::start(
            trigger,
            SHUTDOWN_COUNTDOWN_SECONDS,
            now_mono,
        ));
    }

    fn step_shutdown_countdown(
        &mut self,
        policy: &Policy,
        now_mono: MonotonicInstant,
        events: &mut Vec<CoreEvent>,
    ) {
        loop {
            let Some(countdown) = self.shutdown_countdown.as_mut() else {
                return;
            };
            let Some(remaining) = countdown.step_if_due(now_mono) else {
                return;
            };
            let reason = countdown.target().reason();
            let finished = countdown.is_finished();

            events.push(CoreEvent::Display(DisplayIntent::update(
                reason,
                "",
                DisplayExtra {
                    mode: DisplayMode::TimerOnly,
                    timer_seconds: Some(remaining),
                    force_show: false,
                },
            )));

            if finished {
                self.shutdown_countdown = None;
                events.push(CoreEvent::notice(
                    "Executing System Shutdown",
                    Severity::Warning,
                ));
                if policy.dry_run {
                    info!("Shutdown countdown expired (dry run)");
                    events.push(CoreEvent::notice(
                        "[DRY RUN] Shutdown command skipped",
                        Severity::Success,
                    ));
                    events.push(CoreEvent::Display(DisplayIntent::Hide));
                } else {
                    info!("Shutdown countdown expired, powering off");
                    events.push(CoreEvent::Shutdown);
                }
                return;
            }
        }
    }

    /// End the block session and cancel its countdown, keeping warning
    /// history. Used when the focus moves to an unblocked window, and when
    /// leaving the active window or disabling monitoring.
    fn release_session(&mut self, events: &mut Vec<CoreEvent>) {
        let countdown_cancelled = self.final_countdown.take().is_some();
        let released = self.escalation.release();

        if countdown_cancelled || released.is_some() {
            debug!(app = ?released, countdown_cancelled, "Block session ended");
            events.push(CoreEvent::Display(DisplayIntent::Hide));
        }
    }

    fn observe_query_error(&mut self, error: CurfewError, events: &mut Vec<CoreEvent>) {
        let message = error.to_string();
        if self.last_query_error.as_deref() != Some(message.as_str()) {
            events.push(CoreEvent::notice(message.clone(), Severity::Error));
            self.last_query_error = Some(message);
        }
        if self.last_observed != Some(ObservedState::Error) {
            self.last_observed = Some(ObservedState::Error);
            events.push(CoreEvent::StateChanged(ObservedState::Error));
        }
    }

    /// Edge-triggered transition logging
    fn observe(
        &mut self,
        state: ObservedState,
        notice: Option<(String, Severity)>,
        events: &mut Vec<CoreEvent>,
    ) {
        self.last_query_error = None;
        if self.last_observed == Some(state) {
            return;
        }

        debug!(from = ?self.last_observed, to = %state, "Observed state changed");
        self.last_observed = Some(state);

        if let Some((message, severity)) = notice {
            events.push(CoreEvent::notice(message, severity));
        }
        events.push(CoreEvent::StateChanged(state));
    }

    fn schedule_next_poll(&mut self, policy: &Policy, now_mono: MonotonicInstant) {
        self.next_poll = Some(now_mono + policy.check_interval());
    }

    /// Snapshot for clients
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            api_version: API_VERSION,
            running: self.running,
            observed_state: self.last_observed,
            current_blocked_app: self.escalation.current_app().map(str::to_string),
            final_countdown: self.final_countdown.as_ref().map(|c| CountdownView {
                target: c.target().clone(),
                remaining_seconds: c.remaining(),
            }),
            shutdown_countdown: self.shutdown_countdown.as_ref().map(|c| CountdownView {
                target: c.target().reason().to_string(),
                remaining_seconds: c.remaining(),
            }),
            warning_records: self.escalation.views(),
            scheduled_jobs: self.scheduler.views(),
        }
    }

    pub fn escalation(&self) -> &EscalationMachine {
        &self.escalation
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn has_final_countdown(&self) -> bool {
        self.final_countdown.is_some()
    }

    pub fn has_shutdown_countdown(&self) -> bool {
        self.shutdown_countdown.is_some()
    }
}
