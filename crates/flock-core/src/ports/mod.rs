//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the supervisor expects from the operating
//! system. They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No `tokio::process` or `nix` types in any signature
//! - Intent-based methods (`send`, `signal`), not implementation-leaking ones
//! - Everything the supervisor touches outside its own memory goes through here

pub mod observer;
pub mod pid_marker;
pub mod process;
pub mod signal;

use thiserror::Error;

pub use observer::SupervisorObserver;
pub use pid_marker::PidMarkerPort;
pub use process::{ProcessHandle, ProcessSpawner};
pub use signal::ProcessSignalPort;

/// Domain-specific errors for process operations.
///
/// This error type abstracts away process management implementation details
/// and provides a clean interface for the supervisor to handle failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    /// Failed to start the process.
    #[error("Failed to spawn: {0}")]
    SpawnFailed(String),

    /// The message channel to the process is closed.
    #[error("Message channel closed: {0}")]
    ChannelClosed(String),

    /// No process with this pid exists.
    #[error("No such process: {0}")]
    NoSuchProcess(u32),

    /// The caller may not signal this process.
    #[error("Permission denied for process {0}")]
    PermissionDenied(u32),

    /// Signal delivery failed for another reason.
    #[error("Signal delivery failed: {0}")]
    SignalFailed(String),
}
