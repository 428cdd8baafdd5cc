//! Worker side of the graceful shutdown handshake.
//!
//! A worker process wraps its application in a [`WorkerAgent`]:
//!
//! 1. the agent announces `online` on stdout
//! 2. the app runs, reporting bound sockets through [`WorkerContext::listening`]
//! 3. on `shutdown` from the master the agent answers `shutdown_ack` and
//!    cancels the context's token; the app stops accepting, drains and returns
//! 4. the agent flushes its output and hands back the exit code
//!
//! If stdin closes (the master died) the app is drained the same way, without
//! an acknowledgement.

mod context;

use std::time::Duration;

use async_trait::async_trait;
use flock_core::{ControlMessage, ROLE_ENV, WORKER_ID_ENV, WORKER_ROLE, WorkerId};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub use context::WorkerContext;

/// Upper bound for flushing the last protocol lines after the app returned.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Application run inside a worker process.
#[async_trait]
pub trait WorkerApp: Send {
    /// Serve until `ctx` is cancelled, then drain and return.
    ///
    /// Returning an error makes the worker exit with status 1.
    async fn run(&mut self, ctx: WorkerContext) -> anyhow::Result<()>;
}

/// Runs a [`WorkerApp`] and speaks the master protocol for it.
#[derive(Debug, Clone, Copy)]
pub struct WorkerAgent {
    id: WorkerId,
}

impl WorkerAgent {
    pub const fn new(id: WorkerId) -> Self {
        Self { id }
    }

    /// Whether this process was started by a master as a worker.
    pub fn is_worker_process() -> bool {
        std::env::var(ROLE_ENV).is_ok_and(|role| role == WORKER_ROLE)
    }

    /// Agent for this process, or `None` when it is not a worker.
    pub fn from_env() -> Option<Self> {
        if !Self::is_worker_process() {
            return None;
        }

        let id = match std::env::var(WORKER_ID_ENV).map(|raw| raw.parse::<WorkerId>()) {
            Ok(Ok(id)) => id,
            _ => {
                warn!(var = WORKER_ID_ENV, "Worker id missing or invalid, using 0");
                WorkerId::new(0)
            }
        };
        Some(Self::new(id))
    }

    pub const fn id(&self) -> WorkerId {
        self.id
    }

    /// Run `app` over this process' stdin and stdout. Returns the exit code.
    pub async fn run<A: WorkerApp>(self, app: A) -> i32 {
        self.run_with(app, tokio::io::stdin(), tokio::io::stdout())
            .await
    }

    /// Run `app` over arbitrary streams.
    pub async fn run_with<A, R, W>(self, mut app: A, input: R, output: W) -> i32
    where
        A: WorkerApp,
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let id = self.id;
        let shutdown = CancellationToken::new();
        let (upstream, outbox) = mpsc::unbounded_channel();

        let writer = tokio::spawn(write_upstream(outbox, output));
        let _ = upstream.send(ControlMessage::Online);
        info!(worker = %id, "Worker online");

        let reader = tokio::spawn(read_downstream(
            id,
            input,
            upstream.clone(),
            shutdown.clone(),
        ));

        let ctx = WorkerContext::new(id, shutdown, upstream);
        let code = match app.run(ctx).await {
            Ok(()) => {
                info!(worker = %id, "Worker finished");
                0
            }
            Err(e) => {
                error!(worker = %id, error = %e, "Worker failed");
                1
            }
        };

        reader.abort();
        let _ = reader.await;
        if tokio::time::timeout(FLUSH_TIMEOUT, writer).await.is_err() {
            warn!(worker = %id, "Timed out flushing worker output");
        }

        code
    }
}

async fn read_downstream<R>(
    id: WorkerId,
    input: R,
    upstream: mpsc::UnboundedSender<ControlMessage>,
    shutdown: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match ControlMessage::parse_line(&line) {
                Some(ControlMessage::Shutdown) => {
                    info!(worker = %id, "Shutdown requested by master");
                    let _ = upstream.send(ControlMessage::ShutdownAck);
                    shutdown.cancel();
                }
                Some(other) => debug!(worker = %id, message = ?other, "Ignoring message"),
                None => debug!(worker = %id, %line, "Ignoring non-protocol input"),
            },
            Ok(None) => {
                warn!(worker = %id, "Master channel closed, draining");
                shutdown.cancel();
                return;
            }
            Err(e) => {
                warn!(worker = %id, error = %e, "Failed to read from master, draining");
                shutdown.cancel();
                return;
            }
        }
    }
}

async fn write_upstream<W>(mut outbox: mpsc::UnboundedReceiver<ControlMessage>, mut output: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outbox.recv().await {
        let Ok(line) = message.to_line() else {
            continue;
        };
        if output.write_all(line.as_bytes()).await.is_err() || output.flush().await.is_err() {
            break;
        }
    }
    let _ = output.shutdown().await;
}
