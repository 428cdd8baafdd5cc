//! Starting worker processes.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use flock_core::{
    ProcessError, ProcessHandle, ProcessSpawner, ROLE_ENV, SupervisorSettings, WORKER_ID_ENV,
    WORKER_ROLE, WorkerId,
};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

use super::child::ChildHandle;
use super::notice::WorkerNotice;

/// [`ProcessSpawner`] that runs a program as a child process.
///
/// Workers inherit the master's environment and stderr, and get
/// `FLOCK_ROLE=worker` plus their id so the same binary can tell which side
/// it is on. On unix each worker leads its own process group. Must be used
/// from within a tokio runtime.
pub struct CommandSpawner {
    program: PathBuf,
    args: Vec<String>,
    notices: mpsc::UnboundedSender<WorkerNotice>,
}

impl CommandSpawner {
    pub fn new(
        program: impl Into<PathBuf>,
        args: Vec<String>,
        notices: mpsc::UnboundedSender<WorkerNotice>,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            notices,
        }
    }

    /// Spawner for the configured worker program, or the current executable
    /// when none is configured.
    pub fn from_settings(
        settings: &SupervisorSettings,
        notices: mpsc::UnboundedSender<WorkerNotice>,
    ) -> io::Result<Self> {
        let program = match &settings.worker_program {
            Some(program) => program.clone(),
            None => std::env::current_exe()?,
        };
        Ok(Self::new(program, settings.worker_args.clone(), notices))
    }

    pub const fn program(&self) -> &PathBuf {
        &self.program
    }
}

impl ProcessSpawner for CommandSpawner {
    fn spawn(&mut self, id: WorkerId) -> Result<Box<dyn ProcessHandle>, ProcessError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env(ROLE_ENV, WORKER_ROLE)
            .env(WORKER_ID_ENV, id.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        // Own process group: a terminal Ctrl-C or hang-up reaches only the
        // master, which then runs the shutdown handshake.
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|e| {
            ProcessError::SpawnFailed(format!("{}: {e}", self.program.display()))
        })?;
        debug!(worker = %id, pid = ?child.id(), program = %self.program.display(), "Spawned worker process");

        Ok(Box::new(ChildHandle::attach(id, child, self.notices.clone())))
    }
}
