//! Pid marker of the running master.
//!
//! # Safety guarantees
//! - Atomic writes via temp file + rename
//! - Readers never see a half-written pid
//! - Removal is idempotent

mod io;
mod verify;

use std::path::{Path, PathBuf};

use flock_core::{PidMarkerPort, SupervisorError};

pub use io::{delete_pidfile, read_pidfile, write_pidfile};
pub use verify::pid_exists;

/// [`PidMarkerPort`] backed by a plain text file.
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PidMarkerPort for PidFile {
    fn read(&self) -> Result<Option<u32>, SupervisorError> {
        read_pidfile(&self.path).map_err(|e| pid_file_error("read", &self.path, &e))
    }

    fn write(&self, pid: u32) -> Result<(), SupervisorError> {
        write_pidfile(&self.path, pid).map_err(|e| pid_file_error("write", &self.path, &e))
    }

    fn remove(&self) -> Result<(), SupervisorError> {
        delete_pidfile(&self.path).map_err(|e| pid_file_error("remove", &self.path, &e))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

fn pid_file_error(op: &str, path: &Path, err: &std::io::Error) -> SupervisorError {
    SupervisorError::PidFileIo(format!("cannot {op} {}: {err}", path.display()))
}
