//! CLI command resolution against a possibly running master.
//!
//! `ControlService` is what `flock start|stop|restart|reload|status|help`
//! runs. It never touches the worker pool: it reads the pid marker, probes
//! liveness and delivers signals. Starting a master is reported back as
//! [`ControlOutcome::LaunchMaster`] so the caller decides how to run it.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::SupervisorError;
use crate::ports::{PidMarkerPort, ProcessError, ProcessSignalPort};
use crate::services::running_master;
use crate::settings::SupervisorSettings;
use crate::signal::Signal;
use crate::utils::render;

/// A CLI action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Start,
    Stop,
    Restart,
    Reload,
    Status,
    Help,
}

impl ControlAction {
    /// Resolve a command-line word. Missing or unknown words mean `Help`.
    #[must_use]
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg.map(str::trim) {
            Some("start") => Self::Start,
            Some("stop") => Self::Stop,
            Some("restart") => Self::Restart,
            Some("reload") => Self::Reload,
            Some("status") => Self::Status,
            _ => Self::Help,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Reload => "reload",
            Self::Status => "status",
            Self::Help => "help",
        }
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller should do after a control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    /// No master is running: become one.
    LaunchMaster,
    /// `signal` was delivered to the master `pid`.
    Signalled { pid: u32, signal: Signal },
    /// Liveness report; `None` when no master runs.
    Status { pid: Option<u32> },
    /// Print usage.
    Usage,
}

/// Resolves control commands through the pid marker and signal ports.
pub struct ControlService {
    settings: SupervisorSettings,
    marker: Arc<dyn PidMarkerPort>,
    signals: Arc<dyn ProcessSignalPort>,
}

impl ControlService {
    pub fn new(
        settings: SupervisorSettings,
        marker: Arc<dyn PidMarkerPort>,
        signals: Arc<dyn ProcessSignalPort>,
    ) -> Self {
        Self {
            settings,
            marker,
            signals,
        }
    }

    pub const fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// Run one action to completion.
    pub async fn execute(&self, action: ControlAction) -> Result<ControlOutcome, SupervisorError> {
        debug!(%action, pid_file = %self.marker.location(), "Executing control action");
        match action {
            ControlAction::Start => self.start(),
            ControlAction::Stop => self.stop(),
            ControlAction::Restart => self.restart().await,
            ControlAction::Reload => self.reload(),
            ControlAction::Status => Ok(self.status()),
            ControlAction::Help => Ok(ControlOutcome::Usage),
        }
    }

    /// Refuse when a master is alive, otherwise ask the caller to launch one.
    pub fn start(&self) -> Result<ControlOutcome, SupervisorError> {
        match self.running() {
            Some(pid) => Err(SupervisorError::AlreadyRunning { pid }),
            None => Ok(ControlOutcome::LaunchMaster),
        }
    }

    /// Deliver the shutdown signal to the running master.
    pub fn stop(&self) -> Result<ControlOutcome, SupervisorError> {
        let pid = self.running().ok_or(SupervisorError::NotRunning)?;
        self.deliver(pid, self.settings.shutdown_signal)
    }

    /// Deliver the reload signal to the running master.
    pub fn reload(&self) -> Result<ControlOutcome, SupervisorError> {
        let pid = self.running().ok_or(SupervisorError::NotRunning)?;
        self.deliver(pid, self.settings.reload_signal)
    }

    /// Stop the running master (if any), wait for it to go away, then ask
    /// the caller to launch a new one.
    ///
    /// Gives up with `RestartTimeout` after `restart_attempts` polls spaced by
    /// `restart_interval`, in which case nothing is launched.
    pub async fn restart(&self) -> Result<ControlOutcome, SupervisorError> {
        let Some(pid) = self.running() else {
            info!("No master running, starting a new one");
            return Ok(ControlOutcome::LaunchMaster);
        };

        match self.deliver(pid, self.settings.shutdown_signal) {
            Ok(_) => {}
            Err(SupervisorError::NotRunning) => return Ok(ControlOutcome::LaunchMaster),
            Err(e) => return Err(e),
        }

        let attempts = self.settings.restart_attempts;
        for attempt in 1..=attempts {
            tokio::time::sleep(self.settings.restart_interval).await;
            if !self.signals.is_alive(pid) {
                info!(pid, attempt, "Previous master exited");
                return Ok(ControlOutcome::LaunchMaster);
            }
            debug!(pid, attempt, attempts, "Waiting for previous master to exit");
        }

        warn!(pid, attempts, "Previous master did not exit in time");
        Err(SupervisorError::RestartTimeout { pid, attempts })
    }

    pub fn status(&self) -> ControlOutcome {
        ControlOutcome::Status { pid: self.running() }
    }

    /// Usage line with `{{appPath}}` filled in.
    pub fn usage_text(&self) -> String {
        render(
            &self.settings.help_template,
            &[("appPath", &self.settings.app_name)],
        )
    }

    /// Status line with `{{appPath}}` and `{{runningStatus}}` filled in.
    pub fn status_text(&self, pid: Option<u32>) -> String {
        let running_status = match pid {
            Some(_) => "running",
            None => "not running",
        };
        render(
            &self.settings.status_template,
            &[
                ("appPath", &self.settings.app_name),
                ("runningStatus", running_status),
            ],
        )
    }

    fn running(&self) -> Option<u32> {
        running_master(self.marker.as_ref(), self.signals.as_ref())
    }

    fn deliver(&self, pid: u32, signal: Signal) -> Result<ControlOutcome, SupervisorError> {
        match self.signals.signal(pid, signal) {
            Ok(()) => {
                info!(pid, %signal, "Signal delivered to master");
                Ok(ControlOutcome::Signalled { pid, signal })
            }
            Err(ProcessError::NoSuchProcess(_)) => Err(SupervisorError::NotRunning),
            Err(e) => Err(SupervisorError::SignalDelivery {
                pid,
                signal,
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeSignals, MemoryPidMarker};
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    const MASTER: u32 = 777;

    fn settings() -> SupervisorSettings {
        SupervisorSettings {
            restart_attempts: 3,
            restart_interval: Duration::from_millis(1),
            app_name: "/usr/bin/app".into(),
            ..SupervisorSettings::with_defaults()
        }
    }

    fn service(marker: MemoryPidMarker, signals: FakeSignals) -> (ControlService, Arc<FakeSignals>) {
        let signals = Arc::new(signals);
        let service = ControlService::new(settings(), Arc::new(marker), signals.clone());
        (service, signals)
    }

    #[test]
    fn action_from_arg() {
        assert_eq!(ControlAction::from_arg(Some("start")), ControlAction::Start);
        assert_eq!(ControlAction::from_arg(Some("reload")), ControlAction::Reload);
        assert_eq!(ControlAction::from_arg(Some("bogus")), ControlAction::Help);
        assert_eq!(ControlAction::from_arg(None), ControlAction::Help);
    }

    #[tokio::test]
    async fn start_without_master_launches() {
        let (svc, _) = service(MemoryPidMarker::new(), FakeSignals::new());
        let outcome = assert_ok!(svc.execute(ControlAction::Start).await);
        assert_eq!(outcome, ControlOutcome::LaunchMaster);
    }

    #[tokio::test]
    async fn start_with_live_master_is_refused() {
        let (svc, _) = service(
            MemoryPidMarker::holding(MASTER),
            FakeSignals::with_alive([MASTER]),
        );
        let err = assert_err!(svc.execute(ControlAction::Start).await);
        assert_eq!(err, SupervisorError::AlreadyRunning { pid: MASTER });
    }

    #[tokio::test]
    async fn stop_without_marker_is_not_running() {
        let (svc, signals) = service(MemoryPidMarker::new(), FakeSignals::new());
        let err = assert_err!(svc.execute(ControlAction::Stop).await);
        assert_eq!(err, SupervisorError::NotRunning);
        assert!(signals.delivered().is_empty());
    }

    #[test]
    fn stop_with_stale_marker_is_not_running() {
        let (svc, _) = service(MemoryPidMarker::holding(MASTER), FakeSignals::new());
        assert_eq!(svc.stop(), Err(SupervisorError::NotRunning));
    }

    #[tokio::test]
    async fn stop_sends_shutdown_signal() {
        let (svc, signals) = service(
            MemoryPidMarker::holding(MASTER),
            FakeSignals::with_alive([MASTER]),
        );
        let outcome = assert_ok!(svc.execute(ControlAction::Stop).await);
        assert_eq!(
            outcome,
            ControlOutcome::Signalled {
                pid: MASTER,
                signal: Signal::Terminate
            }
        );
        assert_eq!(signals.delivered(), vec![(MASTER, Signal::Terminate)]);
    }

    #[tokio::test]
    async fn reload_sends_reload_signal() {
        let (svc, signals) = service(
            MemoryPidMarker::holding(MASTER),
            FakeSignals::with_alive([MASTER]),
        );
        assert_ok!(svc.execute(ControlAction::Reload).await);
        assert_eq!(signals.delivered(), vec![(MASTER, Signal::User2)]);
    }

    #[tokio::test]
    async fn refused_delivery_is_reported() {
        let (svc, _) = service(
            MemoryPidMarker::holding(MASTER),
            FakeSignals::with_alive([MASTER]).denying(),
        );
        let err = assert_err!(svc.execute(ControlAction::Reload).await);
        assert!(matches!(
            err,
            SupervisorError::SignalDelivery {
                pid: MASTER,
                signal: Signal::User2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn restart_without_master_launches() {
        let (svc, signals) = service(MemoryPidMarker::new(), FakeSignals::new());
        let outcome = assert_ok!(svc.execute(ControlAction::Restart).await);
        assert_eq!(outcome, ControlOutcome::LaunchMaster);
        assert!(signals.delivered().is_empty());
    }

    #[tokio::test]
    async fn restart_waits_for_exit_then_launches() {
        let (svc, signals) = service(
            MemoryPidMarker::holding(MASTER),
            FakeSignals::with_alive([MASTER]).exiting_on(Signal::Terminate),
        );
        let outcome = assert_ok!(svc.execute(ControlAction::Restart).await);
        assert_eq!(outcome, ControlOutcome::LaunchMaster);
        assert_eq!(signals.delivered(), vec![(MASTER, Signal::Terminate)]);
    }

    #[tokio::test]
    async fn restart_outlasts_a_master_draining_its_pool() {
        // Grace plus reap wait is 1.1 s: the old master answers 110 more
        // liveness checks at 10 ms before it is gone.
        let interval = Duration::from_millis(10);
        let mut settings = SupervisorSettings {
            restart_interval: interval,
            shutdown_grace: Duration::from_millis(100),
            ..settings()
        };
        let checks = u32::try_from(settings.exit_window().as_millis() / interval.as_millis())
            .unwrap();
        settings.restart_attempts = checks + 1;
        assert_ok!(crate::settings::validate_settings(&settings));

        let signals = Arc::new(
            FakeSignals::with_alive([MASTER]).exiting_after(Signal::Terminate, checks),
        );
        let svc = ControlService::new(
            settings,
            Arc::new(MemoryPidMarker::holding(MASTER)),
            signals.clone(),
        );

        let outcome = assert_ok!(svc.execute(ControlAction::Restart).await);
        assert_eq!(outcome, ControlOutcome::LaunchMaster);
        assert_eq!(signals.delivered(), vec![(MASTER, Signal::Terminate)]);
    }

    #[tokio::test]
    async fn restart_times_out_without_launching() {
        let (svc, _) = service(
            MemoryPidMarker::holding(MASTER),
            FakeSignals::with_alive([MASTER]),
        );
        let err = assert_err!(svc.execute(ControlAction::Restart).await);
        assert_eq!(
            err,
            SupervisorError::RestartTimeout {
                pid: MASTER,
                attempts: 3
            }
        );
    }

    #[tokio::test]
    async fn status_reports_pid() {
        let (svc, _) = service(
            MemoryPidMarker::holding(MASTER),
            FakeSignals::with_alive([MASTER]),
        );
        let outcome = assert_ok!(svc.execute(ControlAction::Status).await);
        assert_eq!(outcome, ControlOutcome::Status { pid: Some(MASTER) });
    }

    #[test]
    fn texts_are_rendered() {
        let (svc, _) = service(MemoryPidMarker::new(), FakeSignals::new());
        assert_eq!(
            svc.usage_text(),
            "Usage: /usr/bin/app start | stop | reload | restart | status | help\n"
        );
        assert_eq!(svc.status_text(Some(1)), "/usr/bin/app is running\n");
        assert_eq!(svc.status_text(None), "/usr/bin/app is not running\n");
    }
}
