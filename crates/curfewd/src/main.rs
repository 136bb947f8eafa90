//! curfewd - The curfew background service
//!
//! Wires together:
//! - Configuration loading and reload
//! - Core engine (poll loop, escalation, countdowns, daily jobs)
//! - Host adapter (Linux)
//! - IPC server for the overlay and dashboard

use anyhow::{Context, Result};
use clap::Parser;
use curfew_api::{
    ClientRole, Command, ErrorCode, ErrorInfo, Event, EventPayload, ForegroundWindow, Response,
    ResponsePayload, Severity,
};
use curfew_config::{ConfigStore, FileConfigStore, Policy};
use curfew_core::{CoreEvent, Engine, PollPlan};
use curfew_host_api::{terminate_with_retry, HostAdapter, HostError};
use curfew_host_linux::LinuxHost;
use curfew_ipc::{IpcServer, ServerMessage};
use curfew_util::{
    config_path_without_env, socket_path_without_env, ClientId, CurfewError, MonotonicInstant,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Wakeup when the engine has nothing armed (only after stop)
const IDLE_WAKEUP: Duration = Duration::from_secs(60);

/// curfewd - Focus-hours enforcement service
#[derive(Parser, Debug)]
#[command(name = "curfewd")]
#[command(about = "Blocks distracting apps during focus hours", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/curfew/config.toml)
    #[arg(short, long, env = "CURFEW_CONFIG", default_value_os_t = config_path_without_env())]
    config: PathBuf,

    /// Socket path (default: $XDG_RUNTIME_DIR/curfewd/curfewd.sock)
    #[arg(short, long, env = "CURFEW_SOCKET", default_value_os_t = socket_path_without_env())]
    socket: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log what would be closed or shut down without doing it
    #[arg(long, env = "CURFEW_DRY_RUN")]
    dry_run: bool,
}

/// Main service state
struct Service {
    engine: Engine,
    config: Arc<FileConfigStore>,
    host: Arc<dyn HostAdapter>,
    ipc: Arc<IpcServer>,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let config = FileConfigStore::open(&args.config, args.dry_run)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        log_missing_sections(&config.current());

        let host: Arc<dyn HostAdapter> = Arc::new(LinuxHost::new());
        if !host.is_healthy() {
            warn!("Host adapter reports unhealthy, process lookups may fail");
        }

        let mut ipc = IpcServer::new(&args.socket);
        ipc.start()
            .await
            .with_context(|| format!("Failed to bind socket {:?}", args.socket))?;

        Ok(Self {
            engine: Engine::new().with_self_pid(std::process::id()),
            config: Arc::new(config),
            host,
            ipc: Arc::new(ipc),
        })
    }

    async fn run(mut self) -> Result<()> {
        let mut ipc_messages = self
            .ipc
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let ipc_accept = self.ipc.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        let policy = self.config.current();
        let events = self
            .engine
            .start(&policy, &curfew_util::now(), MonotonicInstant::now());
        self.dispatch(events);

        info!("Service running");

        loop {
            let now = curfew_util::now();
            let now_mono = MonotonicInstant::now();
            let wake_at = self
                .engine
                .next_deadline(&now, now_mono)
                .unwrap_or(now_mono + IDLE_WAKEUP);
            let sleep = tokio::time::sleep_until(tokio::time::Instant::from_std(wake_at.as_instant()));

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }

                _ = sighup.recv() => {
                    info!("Received SIGHUP, reloading configuration");
                    let _ = self.reload_config();
                }

                _ = sleep => {
                    self.on_timer().await;
                }

                Some(msg) = ipc_messages.recv() => {
                    self.handle_ipc_message(msg).await;
                }
            }
        }

        self.ipc
            .broadcast_event(Event::new(EventPayload::ServiceStopping));
        let events = self.engine.stop();
        self.dispatch(events);

        // Let writer tasks flush the final Hide
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("Shutdown complete");
        Ok(())
    }

    /// Service due countdowns and jobs, then poll if the tick is due
    async fn on_timer(&mut self) {
        let policy = self.config.current();
        let now = curfew_util::now();
        let now_mono = MonotonicInstant::now();

        let events = self.engine.fire_due(&policy, &now, now_mono);
        self.dispatch(events);

        if !self.engine.poll_due(now_mono) {
            return;
        }

        match self.engine.begin_poll(&policy, &now, now_mono) {
            PollPlan::Skip(events) => self.dispatch(events),
            PollPlan::QueryWindow => {
                let result = self.query_foreground().await;
                let events = self
                    .engine
                    .finish_poll(&policy, MonotonicInstant::now(), result);
                self.dispatch(events);
            }
        }
    }

    async fn query_foreground(&self) -> Result<Option<ForegroundWindow>, CurfewError> {
        let window = self.host.foreground_window().await.map_err(query_error)?;
        if let Some(window) = &window {
            debug!(
                process = %window.process_name,
                pid = ?window.pid,
                title = %window.window_title,
                "Foreground window"
            );
        }
        Ok(window)
    }

    fn reload_config(&mut self) -> Result<Arc<Policy>, curfew_config::ConfigError> {
        match self.config.reload() {
            Ok(policy) => {
                log_missing_sections(&policy);
                let events = self.engine.on_config_changed(&policy, &curfew_util::now());
                self.dispatch(events);
                self.ipc
                    .broadcast_event(Event::new(EventPayload::PolicyReloaded { success: true }));
                Ok(policy)
            }
            Err(e) => {
                self.ipc.broadcast_event(Event::new(EventPayload::Log {
                    message: format!("Configuration reload failed: {}", e),
                    severity: Severity::Error,
                }));
                self.ipc
                    .broadcast_event(Event::new(EventPayload::PolicyReloaded { success: false }));
                Err(e)
            }
        }
    }

    /// Carry out engine intents. Side effects that block run in their own
    /// task so the loop keeps its timing.
    fn dispatch(&self, events: Vec<CoreEvent>) {
        for event in events {
            match event {
                CoreEvent::Display(intent) => {
                    debug!(intent = ?intent, "Display");
                    self.ipc
                        .broadcast_event(Event::new(EventPayload::Display(intent)));
                }

                CoreEvent::Notice { message, severity } => {
                    log_notice(&message, severity);
                    self.ipc
                        .broadcast_event(Event::new(EventPayload::Log { message, severity }));
                }

                CoreEvent::StateChanged(state) => {
                    debug!(state = %state, "State changed");
                    self.ipc
                        .broadcast_event(Event::new(EventPayload::StateChanged(self.engine.status())));
                }

                CoreEvent::TerminateApp { executable } => {
                    let host = self.host.clone();
                    let ipc = self.ipc.clone();
                    tokio::spawn(async move {
                        if let Err(e) = terminate_with_retry(host.as_ref(), &executable).await {
                            error!(executable = %executable, error = %e, "Termination abandoned");
                            ipc.broadcast_event(Event::new(EventPayload::Log {
                                message: e.to_string(),
                                severity: Severity::Error,
                            }));
                        }
                    });
                }

                CoreEvent::Shutdown => {
                    self.ipc.broadcast_event(Event::new(EventPayload::SystemShutdown));
                    let host = self.host.clone();
                    tokio::spawn(async move {
                        if let Err(e) = host.shutdown().await {
                            error!(error = %e, "System shutdown failed");
                        }
                    });
                }
            }
        }
    }

    async fn handle_ipc_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                let response = self
                    .handle_command(&client_id, request.request_id, request.command)
                    .await;

                if let Err(e) = self.ipc.send_response(&client_id, response).await {
                    debug!(client_id = %client_id, error = %e, "Failed to send response");
                }
            }

            ServerMessage::ClientConnected { client_id, info } => {
                info!(
                    client_id = %client_id,
                    role = ?info.role,
                    uid = ?info.uid,
                    "Client connected"
                );
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");
            }
        }
    }

    async fn handle_command(
        &mut self,
        client_id: &ClientId,
        request_id: u64,
        command: Command,
    ) -> Response {
        match command {
            Command::GetState => {
                Response::success(request_id, ResponsePayload::State(self.engine.status()))
            }

            Command::GetPolicySummary => Response::success(
                request_id,
                ResponsePayload::PolicySummary(self.config.current().summary()),
            ),

            Command::ReloadConfig => {
                let role = self
                    .ipc
                    .get_client_info(client_id)
                    .await
                    .map(|info| info.role)
                    .unwrap_or(ClientRole::Observer);

                if !role.can_reload_config() {
                    warn!(client_id = %client_id, "Config reload denied");
                    return Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::PermissionDenied, "Admin role required"),
                    );
                }

                match self.reload_config() {
                    Ok(_) => Response::success(request_id, ResponsePayload::ConfigReloaded),
                    Err(e) => Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::ConfigError, e.to_string()),
                    ),
                }
            }

            Command::SubscribeEvents => Response::success(
                request_id,
                ResponsePayload::Subscribed {
                    client_id: client_id.clone(),
                },
            ),

            Command::UnsubscribeEvents => {
                Response::success(request_id, ResponsePayload::Unsubscribed)
            }

            Command::Ping => Response::success(request_id, ResponsePayload::Pong),
        }
    }
}

/// Keep the host's own wording for query failures
fn query_error(e: HostError) -> CurfewError {
    match e {
        HostError::WindowQueryFailed(message) => CurfewError::window_query(message),
        other => CurfewError::window_query(other.to_string()),
    }
}

fn log_notice(message: &str, severity: Severity) {
    match severity {
        Severity::Error => error!(target: "curfew::notice", "{}", message),
        Severity::Warning => warn!(target: "curfew::notice", "{}", message),
        Severity::Info | Severity::Success => info!(target: "curfew::notice", "{}", message),
    }
}

fn log_missing_sections(policy: &Policy) {
    for missing in &policy.missing_sections {
        info!("{}, feature disabled", missing);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "curfewd starting");

    if curfew_util::is_mock_time_active() {
        warn!(now = %curfew_util::now(), "Mock time active, schedules follow the fake clock");
    }

    let service = Service::new(&args).await?;
    service.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_error_keeps_host_message() {
        let e = query_error(HostError::WindowQueryFailed("no display".into()));
        assert_eq!(e, CurfewError::window_query("no display"));

        let e = query_error(HostError::Internal("boom".into()));
        assert_eq!(e, CurfewError::window_query("Internal error: boom"));
    }

    #[test]
    fn args_parse_dry_run() {
        let args = Args::parse_from([
            "curfewd",
            "--config",
            "/tmp/curfew.toml",
            "--socket",
            "/tmp/curfewd.sock",
            "--dry-run",
        ]);
        assert!(args.dry_run);
        assert_eq!(args.config, PathBuf::from("/tmp/curfew.toml"));
        assert_eq!(args.log_level, "info");
    }
}
