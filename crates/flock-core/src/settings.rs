//! Supervisor settings and validation.
//!
//! Settings are assembled once at startup (defaults, then an optional config
//! file, then environment overrides) and are never mutated afterwards.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::signal::Signal;

/// Pid marker file name used when no entry executable path is known.
pub const DEFAULT_PID_FILE: &str = "flock.pid";

/// Number of liveness polls `restart` performs before giving up.
///
/// With the default interval this waits 10 s, longer than a default master
/// needs to exit (`DEFAULT_SHUTDOWN_GRACE` plus `REAP_TIMEOUT`).
pub const DEFAULT_RESTART_ATTEMPTS: u32 = 100;

/// Delay between two liveness polls during `restart`.
pub const DEFAULT_RESTART_INTERVAL: Duration = Duration::from_millis(100);

/// How long an exiting master waits for workers before `SIGKILL`.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// How long an exiting master waits for force-killed workers to be reaped.
pub const REAP_TIMEOUT: Duration = Duration::from_secs(1);

/// Usage line printed by `help` (and for unknown actions).
pub const DEFAULT_HELP_TEMPLATE: &str =
    "Usage: {{appPath}} start | stop | reload | restart | status | help\n";

/// Line printed by `status`.
pub const DEFAULT_STATUS_TEMPLATE: &str = "{{appPath}} is {{runningStatus}}\n";

/// Immutable supervisor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorSettings {
    /// Desired number of workers.
    pub target_count: usize,
    /// Replace workers that die without being asked to.
    pub auto_restore: bool,
    /// Location of the pid marker of the running master.
    pub pid_file: PathBuf,
    /// Signal that makes the master exit (sent by `stop` and `restart`).
    pub shutdown_signal: Signal,
    /// Signal that makes the master replace its whole pool.
    pub reload_signal: Signal,
    /// Liveness polls performed by `restart` while waiting for the old master.
    pub restart_attempts: u32,
    /// Delay between those polls.
    pub restart_interval: Duration,
    /// Time given to workers to finish the shutdown handshake on master exit.
    pub shutdown_grace: Duration,
    /// Program each worker runs. `None` re-executes the current binary.
    pub worker_program: Option<PathBuf>,
    /// Arguments passed to the worker program.
    pub worker_args: Vec<String>,
    /// Name shown in help and status output (`{{appPath}}`).
    pub app_name: String,
    /// Template for the usage line.
    pub help_template: String,
    /// Template for the status line.
    pub status_template: String,
}

impl SupervisorSettings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            target_count: Self::default_target_count(),
            auto_restore: true,
            pid_file: PathBuf::from(DEFAULT_PID_FILE),
            shutdown_signal: Signal::Terminate,
            reload_signal: Signal::User2,
            restart_attempts: DEFAULT_RESTART_ATTEMPTS,
            restart_interval: DEFAULT_RESTART_INTERVAL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            worker_program: None,
            worker_args: Vec::new(),
            app_name: "flock".to_string(),
            help_template: DEFAULT_HELP_TEMPLATE.to_string(),
            status_template: DEFAULT_STATUS_TEMPLATE.to_string(),
        }
    }

    /// Total time `restart` waits for the previous master.
    pub fn restart_window(&self) -> Duration {
        self.restart_interval.saturating_mul(self.restart_attempts)
    }

    /// Longest time a master takes to exit once signalled: the shutdown grace,
    /// then the reap wait after force-killing stragglers.
    pub fn exit_window(&self) -> Duration {
        self.shutdown_grace.saturating_add(REAP_TIMEOUT)
    }

    /// One worker per CPU, leaving one CPU for the master, never below one.
    #[must_use]
    pub fn default_target_count() -> usize {
        num_cpus::get().saturating_sub(1).max(1)
    }

    /// Merge an update into these settings, only touching fields that are set.
    pub fn merge(&mut self, update: &SettingsUpdate) {
        if let Some(workers) = update.workers {
            self.target_count = workers;
        }
        if let Some(auto_restore) = update.auto_restore {
            self.auto_restore = auto_restore;
        }
        if let Some(ref path) = update.pid_file {
            self.pid_file.clone_from(path);
        }
        if let Some(signal) = update.shutdown_signal {
            self.shutdown_signal = signal;
        }
        if let Some(signal) = update.reload_signal {
            self.reload_signal = signal;
        }
        if let Some(attempts) = update.restart_attempts {
            self.restart_attempts = attempts;
        }
        if let Some(ms) = update.restart_interval_ms {
            self.restart_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = update.shutdown_grace_ms {
            self.shutdown_grace = Duration::from_millis(ms);
        }
        if let Some(ref program) = update.worker_program {
            self.worker_program = Some(program.clone());
        }
        if let Some(ref args) = update.worker_args {
            self.worker_args.clone_from(args);
        }
        if let Some(ref name) = update.app_name {
            self.app_name.clone_from(name);
        }
        if let Some(ref tmpl) = update.help_template {
            self.help_template.clone_from(tmpl);
        }
        if let Some(ref tmpl) = update.status_template {
            self.status_template.clone_from(tmpl);
        }
    }
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Partial settings as read from a config file or the environment.
///
/// `None` means "leave the current value alone".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SettingsUpdate {
    pub workers: Option<usize>,
    pub auto_restore: Option<bool>,
    pub pid_file: Option<PathBuf>,
    pub shutdown_signal: Option<Signal>,
    pub reload_signal: Option<Signal>,
    pub restart_attempts: Option<u32>,
    pub restart_interval_ms: Option<u64>,
    pub shutdown_grace_ms: Option<u64>,
    pub worker_program: Option<PathBuf>,
    pub worker_args: Option<Vec<String>>,
    pub app_name: Option<String>,
    pub help_template: Option<String>,
    pub status_template: Option<String>,
}

impl SettingsUpdate {
    /// Parse an update from a JSON config document.
    pub fn from_json(content: &str) -> Result<Self, SettingsError> {
        serde_json::from_str(content).map_err(|e| SettingsError::Parse(e.to_string()))
    }
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("Restart attempts must be at least 1, got {0}")]
    InvalidRestartAttempts(u32),

    #[error("Restart interval must be greater than zero")]
    ZeroRestartInterval,

    #[error("Pid file path cannot be empty")]
    EmptyPidFile,

    #[error("Reload and shutdown signals must differ, both are {0}")]
    SignalConflict(Signal),

    #[error("{0} cannot be handled by the master")]
    UncatchableSignal(Signal),

    #[error(
        "Restart waits {restart_ms} ms but a master may take {exit_ms} ms to exit; \
         raise restartAttempts or restartIntervalMs, or lower shutdownGraceMs"
    )]
    RestartWindowTooShort { restart_ms: u128, exit_ms: u128 },

    #[error("Invalid configuration: {0}")]
    Parse(String),
}

/// Validate settings values.
pub fn validate_settings(settings: &SupervisorSettings) -> Result<(), SettingsError> {
    if settings.restart_attempts == 0 {
        return Err(SettingsError::InvalidRestartAttempts(0));
    }

    if settings.restart_interval.is_zero() {
        return Err(SettingsError::ZeroRestartInterval);
    }

    if settings.pid_file.as_os_str().is_empty() {
        return Err(SettingsError::EmptyPidFile);
    }

    for signal in [settings.shutdown_signal, settings.reload_signal] {
        if !signal.is_catchable() {
            return Err(SettingsError::UncatchableSignal(signal));
        }
    }

    if settings.shutdown_signal == settings.reload_signal {
        return Err(SettingsError::SignalConflict(settings.reload_signal));
    }

    // `restart` must outlast a master that is exiting on schedule.
    let (restart, exit) = (settings.restart_window(), settings.exit_window());
    if restart <= exit {
        return Err(SettingsError::RestartWindowTooShort {
            restart_ms: restart.as_millis(),
            exit_ms: exit.as_millis(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = SupervisorSettings::with_defaults();
        assert!(settings.target_count >= 1);
        assert!(settings.auto_restore);
        assert_eq!(settings.pid_file, PathBuf::from(DEFAULT_PID_FILE));
        assert_eq!(settings.shutdown_signal, Signal::Terminate);
        assert_eq!(settings.reload_signal, Signal::User2);
        assert_eq!(settings.restart_attempts, DEFAULT_RESTART_ATTEMPTS);
    }

    #[test]
    fn test_validate_settings_valid() {
        assert!(validate_settings(&SupervisorSettings::with_defaults()).is_ok());
    }

    #[test]
    fn test_validate_zero_attempts() {
        let settings = SupervisorSettings {
            restart_attempts: 0,
            ..Default::default()
        };
        assert_eq!(
            validate_settings(&settings),
            Err(SettingsError::InvalidRestartAttempts(0))
        );
    }

    #[test]
    fn test_validate_empty_pid_file() {
        let settings = SupervisorSettings {
            pid_file: PathBuf::new(),
            ..Default::default()
        };
        assert_eq!(validate_settings(&settings), Err(SettingsError::EmptyPidFile));
    }

    #[test]
    fn test_validate_signal_conflict() {
        let settings = SupervisorSettings {
            reload_signal: Signal::Terminate,
            ..Default::default()
        };
        assert_eq!(
            validate_settings(&settings),
            Err(SettingsError::SignalConflict(Signal::Terminate))
        );
    }

    #[test]
    fn test_validate_kill_as_reload() {
        let settings = SupervisorSettings {
            reload_signal: Signal::Kill,
            ..Default::default()
        };
        assert_eq!(
            validate_settings(&settings),
            Err(SettingsError::UncatchableSignal(Signal::Kill))
        );
    }

    #[test]
    fn test_default_restart_outlasts_exit() {
        let settings = SupervisorSettings::with_defaults();
        assert!(settings.restart_window() > settings.exit_window());
        assert_eq!(settings.exit_window(), DEFAULT_SHUTDOWN_GRACE + REAP_TIMEOUT);
    }

    #[test]
    fn test_validate_restart_shorter_than_exit() {
        // 50 x 100 ms against 5 s grace plus the reap wait.
        let settings = SupervisorSettings {
            restart_attempts: 50,
            ..Default::default()
        };
        assert_eq!(
            validate_settings(&settings),
            Err(SettingsError::RestartWindowTooShort {
                restart_ms: 5_000,
                exit_ms: 6_000,
            })
        );

        let settings = SupervisorSettings {
            shutdown_grace: Duration::from_secs(30),
            ..Default::default()
        };
        assert!(matches!(
            validate_settings(&settings),
            Err(SettingsError::RestartWindowTooShort { .. })
        ));
    }

    #[test]
    fn test_validate_restart_equal_to_exit() {
        let settings = SupervisorSettings {
            restart_attempts: 60,
            ..Default::default()
        };
        assert!(validate_settings(&settings).is_err());

        let settings = SupervisorSettings {
            restart_attempts: 61,
            ..Default::default()
        };
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_merge_settings() {
        let mut settings = SupervisorSettings::with_defaults();
        let update = SettingsUpdate {
            workers: Some(4),
            auto_restore: Some(false),
            restart_interval_ms: Some(20),
            ..Default::default()
        };
        settings.merge(&update);

        assert_eq!(settings.target_count, 4);
        assert!(!settings.auto_restore);
        assert_eq!(settings.restart_interval, Duration::from_millis(20));
        assert_eq!(settings.reload_signal, Signal::User2); // Unchanged
    }

    #[test]
    fn test_update_from_json() {
        let update = SettingsUpdate::from_json(
            r#"{ "workers": 2, "pidFile": "/tmp/app.pid", "reloadSignal": "SIGHUP" }"#,
        )
        .unwrap();

        assert_eq!(update.workers, Some(2));
        assert_eq!(update.pid_file, Some(PathBuf::from("/tmp/app.pid")));
        assert_eq!(update.reload_signal, Some(Signal::HangUp));
    }

    #[test]
    fn test_update_rejects_unknown_keys() {
        let err = SettingsUpdate::from_json(r#"{ "workerz": 2 }"#).unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }
}
