//! Core services.
//!
//! Orchestration that sits between the ports and the outside world. Services
//! here never know which concrete adapter they talk to.

mod control;
mod singleton;

pub use control::{ControlAction, ControlOutcome, ControlService};
pub use singleton::running_master;
