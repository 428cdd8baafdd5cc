//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together
//! for the CLI adapter:
//! - Settings (defaults, config file, environment)
//! - Pid marker and signal adapters (via flock-runtime)
//! - Control service (via flock-core)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use flock_core::{
    ControlService, Signal, SettingsUpdate, SupervisorSettings, validate_settings,
};
use flock_runtime::{OsSignals, PidFile};
use tracing::debug;

use crate::error::CliError;

/// Environment overrides applied after the config file.
pub const ENV_WORKERS: &str = "FLOCK_WORKERS";
pub const ENV_AUTO_RESTORE: &str = "FLOCK_AUTO_RESTORE";
pub const ENV_PID_FILE: &str = "FLOCK_PID_FILE";
pub const ENV_RELOAD_SIGNAL: &str = "FLOCK_RELOAD_SIGNAL";

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Fully resolved, validated supervisor settings.
    pub settings: SupervisorSettings,
}

impl CliConfig {
    /// Settings for an invocation of `exe`: the pid file sits next to the
    /// binary and help text names it.
    pub fn for_executable(exe: &Path) -> SupervisorSettings {
        let mut pid_file = exe.as_os_str().to_owned();
        pid_file.push(".pid");

        SupervisorSettings {
            pid_file: PathBuf::from(pid_file),
            app_name: exe.display().to_string(),
            ..SupervisorSettings::with_defaults()
        }
    }

    /// Defaults, then `config_file`, then the process environment.
    pub fn load(config_file: Option<&Path>) -> Result<Self, CliError> {
        let exe = std::env::current_exe()?;
        Self::load_with(&exe, config_file, |key| std::env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with an explicit executable path and
    /// environment lookup.
    pub fn load_with<F>(exe: &Path, config_file: Option<&Path>, env: F) -> Result<Self, CliError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::for_executable(exe);

        if let Some(path) = config_file {
            debug!(path = %path.display(), "Loading config file");
            let content = std::fs::read_to_string(path)
                .map_err(|e| CliError::Config(format!("{}: {e}", path.display())))?;
            settings.merge(&SettingsUpdate::from_json(&content)?);
        }

        settings.merge(&env_overrides(env)?);
        validate_settings(&settings)?;

        Ok(Self { settings })
    }
}

/// Read the `FLOCK_*` overrides through `env`.
pub fn env_overrides<F>(env: F) -> Result<SettingsUpdate, CliError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut update = SettingsUpdate::default();

    if let Some(raw) = env(ENV_WORKERS) {
        let workers = raw
            .trim()
            .parse::<usize>()
            .map_err(|_| CliError::Config(format!("{ENV_WORKERS} must be a number, got {raw:?}")))?;
        update.workers = Some(workers);
    }

    if let Some(raw) = env(ENV_AUTO_RESTORE) {
        update.auto_restore = Some(parse_bool(&raw).ok_or_else(|| {
            CliError::Config(format!("{ENV_AUTO_RESTORE} must be true or false, got {raw:?}"))
        })?);
    }

    if let Some(raw) = env(ENV_PID_FILE)
        && !raw.trim().is_empty()
    {
        update.pid_file = Some(PathBuf::from(raw.trim()));
    }

    if let Some(raw) = env(ENV_RELOAD_SIGNAL) {
        let signal = raw
            .parse::<Signal>()
            .map_err(|e| CliError::Config(format!("{ENV_RELOAD_SIGNAL}: {e}")))?;
        update.reload_signal = Some(signal);
    }

    Ok(update)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Fully composed context for CLI commands.
pub struct CliContext {
    /// Resolved settings.
    pub settings: SupervisorSettings,
    /// Command resolution against a running master.
    pub control: ControlService,
}

impl CliContext {
    /// Access the control service.
    pub const fn control(&self) -> &ControlService {
        &self.control
    }

    /// Access the settings.
    pub const fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }
}

/// Bootstrap the CLI application.
pub fn bootstrap(config: CliConfig) -> CliContext {
    let marker = Arc::new(PidFile::new(config.settings.pid_file.clone()));
    let control = ControlService::new(
        config.settings.clone(),
        marker,
        Arc::new(OsSignals::new()),
    );

    CliContext {
        settings: config.settings,
        control,
    }
}
