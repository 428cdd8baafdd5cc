//! Built-in worker: a TCP echo server.
//!
//! Every worker binds its own listener, so `FLOCK_ECHO_ADDR` should name port
//! 0 unless the platform balances a shared port.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use flock_runtime::{WorkerApp, WorkerContext};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Address the echo worker binds when nothing else is configured.
pub const DEFAULT_ECHO_ADDR: &str = "127.0.0.1:0";

/// Environment variable naming the bind address.
pub const ENV_ECHO_ADDR: &str = "FLOCK_ECHO_ADDR";

/// How long open connections may linger after shutdown was requested.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

/// Echoes every byte back to the peer until shut down.
#[derive(Debug, Clone)]
pub struct EchoWorker {
    address: String,
}

impl EchoWorker {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// Bind address from `FLOCK_ECHO_ADDR`, or [`DEFAULT_ECHO_ADDR`].
    pub fn from_env() -> Self {
        Self::new(std::env::var(ENV_ECHO_ADDR).unwrap_or_else(|_| DEFAULT_ECHO_ADDR.to_string()))
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl WorkerApp for EchoWorker {
    async fn run(&mut self, ctx: WorkerContext) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.address)
            .await
            .with_context(|| format!("binding {}", self.address))?;
        let local = listener.local_addr()?;
        ctx.listening(local.to_string());

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                () = ctx.cancelled() => break,
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    debug!(worker = %ctx.id(), %peer, "Accepted connection");
                    connections.spawn(echo(stream, ctx.shutdown_token().clone()));
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(listener);
        info!(worker = %ctx.id(), open = connections.len(), "Draining connections");
        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                worker = %ctx.id(),
                open = connections.len(),
                "Dropping connections after drain timeout"
            );
            connections.shutdown().await;
        }

        Ok(())
    }
}

/// Echo until the peer closes, or until shutdown and the current read is done.
async fn echo(mut stream: TcpStream, shutdown: CancellationToken) {
    let mut buf = [0u8; 4096];
    loop {
        let read = tokio::select! {
            () = shutdown.cancelled() => break,
            read = stream.read(&mut buf) => read,
        };
        match read {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if stream.write_all(&buf[..n]).await.is_err() {
                    break;
                }
            }
        }
    }
    let _ = stream.shutdown().await;
}
