use flock_core::{ControlMessage, WorkerId};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// What a worker app gets from its agent.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    id: WorkerId,
    shutdown: CancellationToken,
    upstream: mpsc::UnboundedSender<ControlMessage>,
}

impl WorkerContext {
    pub(crate) const fn new(
        id: WorkerId,
        shutdown: CancellationToken,
        upstream: mpsc::UnboundedSender<ControlMessage>,
    ) -> Self {
        Self {
            id,
            shutdown,
            upstream,
        }
    }

    pub const fn id(&self) -> WorkerId {
        self.id
    }

    /// Cancelled once the worker must stop accepting new work.
    pub const fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Resolves when shutdown was requested.
    pub async fn cancelled(&self) {
        self.shutdown.cancelled().await;
    }

    /// Tell the master a socket is bound.
    pub fn listening(&self, address: impl Into<String>) {
        let address = address.into();
        info!(worker = %self.id, %address, "Worker listening");
        let _ = self.upstream.send(ControlMessage::Listening { address });
    }
}
