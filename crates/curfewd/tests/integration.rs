//! Integration tests for curfewd
//!
//! These drive the engine against a mock host the same way the daemon's
//! timer handler does, one simulated second at a time.

use chrono::{DateTime, Local, TimeZone};
use curfew_api::{DisplayIntent, ForegroundWindow, ObservedState};
use curfew_config::{parse_config, ConfigStore, FileConfigStore, Policy, StaticConfigStore};
use curfew_core::{CoreEvent, Engine, PollPlan};
use curfew_host_api::{terminate_with_retry, HostAdapter, HostError, MockHost};
use curfew_util::{CurfewError, MonotonicInstant};
use std::io::Write;
use std::time::Duration;

const BASE_CONFIG: &str = r#"
config_version = 1
block_keywords = ["youtube", "reddit"]
allow_keywords = ["tutorial"]

[active_window]
start_time = "09:00"
end_time = "23:59"
check_interval_seconds = 10
warning_interval_seconds = 10
max_warnings = 3

[blocklist]
processes = ["steam", "discord"]

[whitelist]
processes = ["code"]
"#;

fn local(h: u32, m: u32, s: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 3, 10, h, m, s).unwrap()
}

/// Engine plus mock host, advanced in whole simulated seconds
struct Harness {
    engine: Engine,
    host: MockHost,
    config: StaticConfigStore,
    wall0: DateTime<Local>,
    mono0: MonotonicInstant,
    events: Vec<(u64, CoreEvent)>,
}

impl Harness {
    fn new(policy: Policy, wall0: DateTime<Local>) -> Self {
        let mono0 = MonotonicInstant::now();
        let mut engine = Engine::new();
        let events = engine
            .start(&policy, &wall0, mono0)
            .into_iter()
            .map(|e| (0, e))
            .collect();

        Self {
            engine,
            host: MockHost::new(),
            config: StaticConfigStore::new(policy),
            wall0,
            mono0,
            events,
        }
    }

    fn focus(&self, process: &str, title: &str) {
        self.host
            .set_foreground(Some(ForegroundWindow::new(process, title)));
    }

    /// Run every timer that is due at `t` seconds after start
    async fn tick(&mut self, t: u64) {
        let now = self.wall0 + chrono::Duration::seconds(t as i64);
        let now_mono = self.mono0 + Duration::from_secs(t);
        let policy = self.config.current();

        let fired = self.engine.fire_due(&policy, &now, now_mono);
        self.record(t, fired).await;

        if !self.engine.poll_due(now_mono) {
            return;
        }

        let polled = match self.engine.begin_poll(&policy, &now, now_mono) {
            PollPlan::Skip(events) => events,
            PollPlan::QueryWindow => {
                let result = self.host.foreground_window().await.map_err(|e| match e {
                    HostError::WindowQueryFailed(message) => CurfewError::window_query(message),
                    other => CurfewError::window_query(other.to_string()),
                });
                self.engine.finish_poll(&policy, now_mono, result)
            }
        };
        self.record(t, polled).await;
    }

    async fn record(&mut self, t: u64, events: Vec<CoreEvent>) {
        for event in events {
            self.carry_out(&event).await;
            self.events.push((t, event));
        }
    }

    async fn run_until(&mut self, from: u64, to: u64) {
        for t in from..=to {
            self.tick(t).await;
        }
    }

    async fn carry_out(&self, event: &CoreEvent) {
        match event {
            CoreEvent::TerminateApp { executable } => {
                if terminate_with_retry(&self.host, executable).await.is_ok() {
                    // The killed app's window goes away with it
                    self.host.set_foreground(None);
                }
            }
            CoreEvent::Shutdown => {
                let _ = self.host.shutdown().await;
            }
            _ => {}
        }
    }

    fn notices_at(&self, t: u64) -> Vec<&str> {
        self.events
            .iter()
            .filter(|(at, _)| *at == t)
            .filter_map(|(_, e)| match e {
                CoreEvent::Notice { message, .. } => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    fn all_notices(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|(_, e)| match e {
                CoreEvent::Notice { message, .. } => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    fn show_times(&self) -> Vec<(u64, bool)> {
        self.events
            .iter()
            .filter_map(|(t, e)| match e {
                CoreEvent::Display(DisplayIntent::Show { urgent, .. }) => Some((*t, *urgent)),
                _ => None,
            })
            .collect()
    }

    fn termination_times(&self) -> Vec<u64> {
        self.events
            .iter()
            .filter_map(|(t, e)| matches!(e, CoreEvent::TerminateApp { .. }).then_some(*t))
            .collect()
    }

    fn countdown_updates(&self) -> Vec<(u64, u64)> {
        self.events
            .iter()
            .filter_map(|(t, e)| match e {
                CoreEvent::Display(DisplayIntent::Update { title, extra, .. })
                    if title == "FINAL WARNING" =>
                {
                    extra.timer_seconds.map(|s| (*t, s))
                }
                _ => None,
            })
            .collect()
    }
}

#[tokio::test]
async fn test_three_strikes_then_close() {
    let mut h = Harness::new(parse_config(BASE_CONFIG).unwrap(), local(12, 0, 0));
    h.host.add_process("steam");
    h.focus("steam", "Steam");

    h.run_until(0, 30).await;

    assert_eq!(h.show_times(), vec![(0, false), (10, false), (20, true)]);
    assert!(h.notices_at(0).contains(&"Blocked steam (Blocklisted App) - Warning 1/3"));
    assert!(h.notices_at(10).contains(&"steam - Warning 2/3"));
    assert!(h.notices_at(20).contains(&"FINAL WARNING: steam will be closed"));

    let updates = h.countdown_updates();
    assert_eq!(updates.len(), 10);
    assert_eq!(updates.first(), Some(&(21, 9)));
    assert_eq!(updates.last(), Some(&(30, 0)));

    assert_eq!(h.termination_times(), vec![30]);
    assert!(h.notices_at(30).contains(&"Force closing steam"));
    assert_eq!(h.host.terminate_calls(), vec!["steam".to_string()]);
    assert!(h.host.running_processes().is_empty());

    // History for the closed app starts over
    assert!(h.engine.escalation().record("steam").is_none());
}

#[tokio::test]
async fn test_switching_away_cancels_countdown() {
    let config = BASE_CONFIG.replace("check_interval_seconds = 10", "check_interval_seconds = 2");
    let mut h = Harness::new(parse_config(&config).unwrap(), local(12, 0, 0));
    h.host.add_process("steam");
    h.focus("steam", "Steam");

    h.run_until(0, 22).await;
    assert!(h.engine.has_final_countdown());

    h.focus("code", "lib.rs - Visual Studio Code");
    h.run_until(23, 45).await;

    assert!(!h.engine.has_final_countdown());
    assert!(h.termination_times().is_empty());
    assert!(h.host.terminate_calls().is_empty());
    assert_eq!(h.engine.status().observed_state, Some(ObservedState::Whitelisted));

    // Warnings are remembered across the switch
    let record = h.engine.escalation().record("steam").unwrap();
    assert_eq!(record.warning_count, 3);
    assert!(!record.countdown_active);
}

#[tokio::test]
async fn test_strict_mode_closes_immediately() {
    let config = format!("strict_mode = true\n{}", BASE_CONFIG);
    let mut h = Harness::new(parse_config(&config).unwrap(), local(12, 0, 0));
    h.host.add_process("discord");
    h.focus("discord", "Discord");

    h.tick(0).await;

    assert!(h.show_times().is_empty());
    assert_eq!(h.termination_times(), vec![0]);
    assert!(h.notices_at(0).contains(&"[STRICT] Blocking discord: Blocklisted App"));
    assert!(h.notices_at(0).contains(&"Force closing discord (Strict Mode)"));
    assert_eq!(h.host.terminate_calls(), vec!["discord".to_string()]);
}

#[tokio::test]
async fn test_dry_run_never_terminates() {
    let config = format!("dry_run = true\n{}", BASE_CONFIG);
    let mut h = Harness::new(parse_config(&config).unwrap(), local(12, 0, 0));
    h.host.add_process("steam");
    h.focus("steam", "Steam");

    h.run_until(0, 30).await;

    assert!(h.termination_times().is_empty());
    assert!(h.notices_at(30).contains(&"[DRY RUN] Would close steam"));
    assert!(h.host.terminate_calls().is_empty());
    assert_eq!(h.host.running_processes(), vec!["steam".to_string()]);
}

#[tokio::test]
async fn test_keywords_in_browser_titles() {
    let mut h = Harness::new(parse_config(BASE_CONFIG).unwrap(), local(12, 0, 0));

    h.focus("firefox", "Rust tutorial - YouTube - Mozilla Firefox");
    h.tick(0).await;
    assert!(h
        .notices_at(0)
        .contains(&"Allowed by keyword \"tutorial\": Rust tutorial - YouTube - Mozilla Firefox"));

    h.focus("firefox", "Cats - YouTube - Mozilla Firefox");
    h.run_until(1, 10).await;
    assert!(h
        .notices_at(10)
        .contains(&"Blocked firefox (Keyword \"youtube\") - Warning 1/3"));
}

#[tokio::test]
async fn test_termination_retries_alternate_name() {
    let config = format!("strict_mode = true\n{}", BASE_CONFIG);
    let mut h = Harness::new(parse_config(&config).unwrap(), local(12, 0, 0));
    // Only the Wine-style name is in the process table
    h.host.add_process("steam.exe");
    h.focus("steam", "Steam");

    h.tick(0).await;

    assert_eq!(
        h.host.terminate_calls(),
        vec!["steam".to_string(), "steam.exe".to_string()]
    );
    assert!(h.host.running_processes().is_empty());
}

#[tokio::test]
async fn test_termination_failure_is_not_fatal() {
    let config = format!("strict_mode = true\n{}", BASE_CONFIG);
    let mut h = Harness::new(parse_config(&config).unwrap(), local(12, 0, 0));
    h.focus("steam", "Steam");

    h.tick(0).await;

    let result = terminate_with_retry(&h.host, "steam").await;
    assert!(matches!(result, Err(CurfewError::TerminationFailed { .. })));

    // The engine keeps polling
    h.run_until(1, 10).await;
    assert_eq!(h.termination_times(), vec![0, 10]);
}

#[tokio::test]
async fn test_overnight_window() {
    let config = BASE_CONFIG
        .replace("start_time = \"09:00\"", "start_time = \"00:00\"")
        .replace("end_time = \"23:59\"", "end_time = \"06:00\"");
    let policy = parse_config(&config).unwrap();

    let mut late = Harness::new(policy.clone(), local(23, 0, 0));
    late.focus("steam", "Steam");
    late.tick(0).await;
    assert_eq!(late.engine.status().observed_state, Some(ObservedState::OutsideWindow));
    assert!(late
        .all_notices()
        .contains(&"Outside active window (00:00-06:00), enforcement paused"));
    assert!(late.show_times().is_empty());

    let mut early = Harness::new(policy, local(1, 0, 0));
    early.focus("steam", "Steam");
    early.tick(0).await;
    assert_eq!(early.engine.status().observed_state, Some(ObservedState::Blocked));
    assert_eq!(early.show_times(), vec![(0, false)]);
}

#[tokio::test]
async fn test_query_failure_logged_once() {
    let mut h = Harness::new(parse_config(BASE_CONFIG).unwrap(), local(12, 0, 0));
    h.host.set_fail_query(Some("cannot open display"));

    h.run_until(0, 30).await;

    let failures = h
        .all_notices()
        .into_iter()
        .filter(|m| m.contains("cannot open display"))
        .count();
    assert_eq!(failures, 1);
    assert_eq!(h.engine.status().observed_state, Some(ObservedState::Error));

    h.host.set_fail_query(None);
    h.focus("code", "main.rs - Visual Studio Code");
    h.run_until(31, 40).await;
    assert_eq!(h.engine.status().observed_state, Some(ObservedState::Whitelisted));
}

#[tokio::test]
async fn test_end_of_window_shutdown() {
    let config = BASE_CONFIG
        .replace("end_time = \"23:59\"", "end_time = \"12:01\"")
        .replace("max_warnings = 3", "max_warnings = 3\nshutdown_at_end = true");
    let mut h = Harness::new(parse_config(&config).unwrap(), local(12, 0, 0));
    h.focus("code", "main.rs - Visual Studio Code");

    assert!(h.all_notices().contains(&"Scheduled shutdown for 12:01"));

    h.run_until(0, 119).await;
    assert_eq!(h.host.shutdown_calls(), 0);
    assert!(h.engine.has_shutdown_countdown());
    assert!(h
        .notices_at(60)
        .contains(&"Focus Session Ended. Initiating Shutdown."));

    h.tick(120).await;
    assert!(h.notices_at(120).contains(&"Executing System Shutdown"));
    assert_eq!(h.host.shutdown_calls(), 1);
}

#[tokio::test]
async fn test_config_file_reload() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(BASE_CONFIG.as_bytes()).unwrap();
    file.flush().unwrap();

    let store = FileConfigStore::open(file.path(), false).unwrap();
    let mut h = Harness::new((*store.current()).clone(), local(12, 0, 0));
    assert!(h.engine.scheduler().jobs().is_empty());

    let updated = format!(
        "{}\n[scheduled_shutdown]\nenabled = true\ntime = \"22:30\"\n",
        BASE_CONFIG
    );
    std::fs::write(file.path(), updated).unwrap();

    let policy = store.reload().unwrap();
    let events = h.engine.on_config_changed(&policy, &local(12, 0, 5));
    h.config.replace((*policy).clone());

    let messages: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            CoreEvent::Notice { message, .. } => Some(message.as_str()),
            _ => None,
        })
        .collect();
    assert!(messages.contains(&"Configuration reloaded"));
    assert!(messages.contains(&"Daily shutdown scheduled for 22:30"));
    assert_eq!(h.engine.scheduler().jobs().len(), 1);

    // A broken file keeps the running policy
    std::fs::write(file.path(), "config_version = [").unwrap();
    assert!(store.reload().is_err());
    assert!(store.current().scheduled_shutdown.is_some());
}

#[tokio::test]
async fn test_stop_cancels_everything() {
    let mut h = Harness::new(parse_config(BASE_CONFIG).unwrap(), local(12, 0, 0));
    h.host.add_process("steam");
    h.focus("steam", "Steam");
    h.run_until(0, 22).await;
    assert!(h.engine.has_final_countdown());

    let events = h.engine.stop();
    assert!(events.contains(&CoreEvent::Display(DisplayIntent::Hide)));
    assert_eq!(h.engine.next_deadline(&local(12, 0, 23), h.mono0), None);

    h.run_until(23, 40).await;
    assert!(h.termination_times().is_empty());
    assert!(h.host.terminate_calls().is_empty());
}
