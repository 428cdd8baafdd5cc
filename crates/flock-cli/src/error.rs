//! CLI-specific error types and mappings.
//!
//! This module provides error types for the CLI adapter and mappings
//! from `SupervisorError` to exit codes and user-facing messages.

use flock_core::{SettingsError, SupervisorError};
use flock_runtime::MasterError;
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Core supervisor error (already running, not running, restart timeout).
    #[error("{0}")]
    Core(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Process or signal error.
    #[error("Process error: {0}")]
    Process(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 0: Success
    /// - 1: General error
    /// - 64-78: Reserved for specific error categories (see sysexits.h)
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Core(_) => 1,
            Self::Io(_) => 74,      // EX_IOERR
            Self::Config(_) => 78,  // EX_CONFIG
            Self::Process(_) => 71, // EX_OSERR
        }
    }
}

impl From<SupervisorError> for CliError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::Settings(settings_err) => Self::Config(settings_err.to_string()),
            SupervisorError::PidFileIo(msg) => Self::Io(msg),
            err @ (SupervisorError::SignalDelivery { .. } | SupervisorError::Spawn(_)) => {
                Self::Process(err.to_string())
            }
            other => Self::Core(other.to_string()),
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<MasterError> for CliError {
    fn from(err: MasterError) -> Self {
        match err {
            MasterError::Supervisor(e) => e.into(),
            other => Self::Process(other.to_string()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
