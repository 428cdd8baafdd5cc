//! Handle to one spawned worker and its helper tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use flock_core::{ControlMessage, ProcessError, ProcessHandle, Signal, WorkerId};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::notice::WorkerNotice;
use super::signal::deliver_signal;

/// The master's end of a worker.
///
/// Dropping it closes the writer, which closes the worker's stdin.
pub struct ChildHandle {
    id: WorkerId,
    pid: Option<u32>,
    outbox: mpsc::UnboundedSender<ControlMessage>,
    exited: Arc<AtomicBool>,
}

impl ChildHandle {
    /// Take over `child`: start its writer, reader and waiter tasks and
    /// announce it as forked.
    pub fn attach(
        id: WorkerId,
        mut child: Child,
        notices: mpsc::UnboundedSender<WorkerNotice>,
    ) -> Self {
        let pid = child.id();
        let exited = Arc::new(AtomicBool::new(false));
        let (outbox, inbox) = mpsc::unbounded_channel();

        match child.stdin.take() {
            Some(stdin) => {
                tokio::spawn(write_messages(id, stdin, inbox));
            }
            None => warn!(worker = %id, "Worker has no stdin, it will not receive messages"),
        }

        match child.stdout.take() {
            Some(stdout) => {
                tokio::spawn(read_messages(id, stdout, notices.clone()));
            }
            None => {
                let _ = notices.send(WorkerNotice::Disconnected { id });
            }
        }

        tokio::spawn(wait_for_exit(id, child, Arc::clone(&exited), notices.clone()));

        let _ = notices.send(WorkerNotice::Forked { id });

        Self {
            id,
            pid,
            outbox,
            exited,
        }
    }
}

impl ProcessHandle for ChildHandle {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn send(&self, message: &ControlMessage) -> Result<(), ProcessError> {
        self.outbox
            .send(message.clone())
            .map_err(|_| ProcessError::ChannelClosed(format!("worker {}", self.id)))
    }

    fn signal(&self, signal: Signal) -> Result<(), ProcessError> {
        let pid = self.pid.ok_or(ProcessError::NoSuchProcess(0))?;
        // The pid may already belong to someone else once reaped.
        if self.exited.load(Ordering::Acquire) {
            return Err(ProcessError::NoSuchProcess(pid));
        }
        deliver_signal(pid, signal)
    }
}

async fn write_messages(
    id: WorkerId,
    mut stdin: ChildStdin,
    mut inbox: mpsc::UnboundedReceiver<ControlMessage>,
) {
    while let Some(message) = inbox.recv().await {
        let line = match message.to_line() {
            Ok(line) => line,
            Err(e) => {
                warn!(worker = %id, error = %e, "Failed to encode message");
                continue;
            }
        };

        if let Err(e) = stdin.write_all(line.as_bytes()).await {
            debug!(worker = %id, error = %e, "Worker stdin closed");
            break;
        }
        if let Err(e) = stdin.flush().await {
            debug!(worker = %id, error = %e, "Worker stdin closed");
            break;
        }
    }
}

async fn read_messages(
    id: WorkerId,
    stdout: ChildStdout,
    notices: mpsc::UnboundedSender<WorkerNotice>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match ControlMessage::parse_line(&line) {
                Some(message) => {
                    if notices.send(WorkerNotice::Message { id, message }).is_err() {
                        return;
                    }
                }
                None if line.trim().is_empty() => {}
                None => info!(worker = %id, "{line}"),
            },
            Ok(None) => break,
            Err(e) => {
                warn!(worker = %id, error = %e, "Failed to read worker output");
                break;
            }
        }
    }
    let _ = notices.send(WorkerNotice::Disconnected { id });
}

async fn wait_for_exit(
    id: WorkerId,
    mut child: Child,
    exited: Arc<AtomicBool>,
    notices: mpsc::UnboundedSender<WorkerNotice>,
) {
    let (code, signal) = match child.wait().await {
        Ok(status) => (status.code(), exit_signal(&status)),
        Err(e) => {
            warn!(worker = %id, error = %e, "Failed to wait for worker");
            (None, None)
        }
    };
    exited.store(true, Ordering::Release);
    let _ = notices.send(WorkerNotice::Exited { id, code, signal });
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}
