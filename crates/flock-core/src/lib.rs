#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod error;
pub mod events;
pub mod ports;
pub mod protocol;
pub mod services;
pub mod settings;
pub mod signal;
pub mod state;
pub mod supervisor;
pub mod utils;
pub mod worker;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types for convenience
pub use error::SupervisorError;
pub use events::{ExitDisposition, SupervisorEvent};
pub use ports::{
    PidMarkerPort, ProcessError, ProcessHandle, ProcessSignalPort, ProcessSpawner,
    SupervisorObserver,
};
pub use protocol::{ControlMessage, ROLE_ENV, WORKER_ID_ENV, WORKER_ROLE};
pub use services::{ControlAction, ControlOutcome, ControlService, running_master};
pub use settings::{
    DEFAULT_PID_FILE, DEFAULT_RESTART_ATTEMPTS, DEFAULT_RESTART_INTERVAL, DEFAULT_SHUTDOWN_GRACE,
    REAP_TIMEOUT, SettingsError, SettingsUpdate, SupervisorSettings, validate_settings,
};
pub use signal::{ParseSignalError, Signal};
pub use state::{MasterState, WorkerState};
pub use supervisor::{PoolSnapshot, Supervisor};
pub use worker::{WorkerId, WorkerRecord, WorkerSummary};
