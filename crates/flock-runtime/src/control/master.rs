//! Composition of a real master process.

use std::sync::Arc;

use flock_core::{Supervisor, SupervisorObserver, SupervisorSettings};
use tokio::sync::mpsc;
use tracing::info;

use super::MasterError;
use super::channel::ControlChannel;
use super::signals::SignalListener;
use crate::pidfile::PidFile;
use crate::process::{CommandSpawner, OsSignals};

/// Pending signals beyond this are held back by the OS until the loop
/// catches up.
const STIMULUS_BUFFER: usize = 16;

/// Run a master in the current process until it is told to exit.
///
/// Signal handlers are installed before the supervisor starts. Returns the
/// code the process should exit with.
pub async fn run_master(
    settings: SupervisorSettings,
    observers: Vec<Arc<dyn SupervisorObserver>>,
) -> Result<i32, MasterError> {
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let (stimulus_tx, stimulus_rx) = mpsc::channel(STIMULUS_BUFFER);

    let spawner =
        CommandSpawner::from_settings(&settings, notice_tx).map_err(MasterError::WorkerProgram)?;
    info!(
        program = %spawner.program().display(),
        workers = settings.target_count,
        pid_file = %settings.pid_file.display(),
        "Starting master"
    );

    let marker = Arc::new(PidFile::new(settings.pid_file.clone()));
    let listener = SignalListener::spawn(&settings, &stimulus_tx).map_err(MasterError::Signals)?;

    let mut supervisor = Supervisor::new(
        settings,
        Box::new(spawner),
        marker,
        Arc::new(OsSignals::new()),
    );
    for observer in observers {
        supervisor.subscribe(observer);
    }

    let code = ControlChannel::new(supervisor, notice_rx, stimulus_rx)
        .launch()
        .await?;

    drop(listener);
    drop(stimulus_tx);
    Ok(code)
}
