#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod agent;
pub mod control;
pub mod observers;
pub mod pidfile;
pub mod process;

// Silence unused dev-dependency warnings; used by integration tests
#[cfg(test)]
use tokio_test as _;

// Re-export the master entry point and worker side
pub use agent::{WorkerAgent, WorkerApp, WorkerContext};
pub use control::{ControlChannel, MasterError, SignalListener, Stimulus, run_master};

// Re-export OS adapters of the core ports
pub use observers::{EventBroadcaster, LogObserver};
pub use pidfile::PidFile;
pub use process::{ChildHandle, CommandSpawner, OsSignals, WorkerNotice};
