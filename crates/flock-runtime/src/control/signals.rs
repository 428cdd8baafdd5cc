//! OS signal listener.
//!
//! Each bound signal gets a forwarding task that turns deliveries into
//! [`Stimulus`] values on a bounded channel read by the control loop.

use std::io;

use flock_core::{Signal, SupervisorSettings};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// What the master was asked to do from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stimulus {
    /// Exit with status 0.
    Shutdown { signal: Signal },
    /// `SIGHUP`, notification only.
    HangUp,
    /// Replace the worker pool.
    Reload,
}

/// Signal to stimulus table for `settings`.
///
/// The reload signal is bound first, so configuring `SIGHUP` as the reload
/// signal turns hang-ups into reloads. `SIGINT` always shuts down, next to the
/// configured shutdown signal.
pub fn bindings(settings: &SupervisorSettings) -> Vec<(Signal, Stimulus)> {
    let candidates = [
        (settings.reload_signal, Stimulus::Reload),
        (
            settings.shutdown_signal,
            Stimulus::Shutdown {
                signal: settings.shutdown_signal,
            },
        ),
        (
            Signal::Interrupt,
            Stimulus::Shutdown {
                signal: Signal::Interrupt,
            },
        ),
        (Signal::HangUp, Stimulus::HangUp),
    ];

    let mut bound: Vec<(Signal, Stimulus)> = Vec::with_capacity(candidates.len());
    for (signal, stimulus) in candidates {
        if bound.iter().all(|(taken, _)| *taken != signal) {
            bound.push((signal, stimulus));
        }
    }
    bound
}

/// Running forwarding tasks. Dropping it stops listening.
pub struct SignalListener {
    tasks: Vec<JoinHandle<()>>,
}

impl SignalListener {
    /// Install handlers for every binding and start forwarding.
    ///
    /// Handlers are installed before this returns, so no signal sent after it
    /// is lost.
    #[cfg(unix)]
    pub fn spawn(
        settings: &SupervisorSettings,
        stimuli: &mpsc::Sender<Stimulus>,
    ) -> io::Result<Self> {
        use tokio::signal::unix::signal;

        let mut tasks = Vec::new();
        for (sig, stimulus) in bindings(settings) {
            let Some(kind) = signal_kind(sig) else {
                warn!(signal = %sig, "Signal cannot be handled, skipping");
                continue;
            };
            let mut stream = signal(kind)?;
            let tx = stimuli.clone();
            debug!(signal = %sig, ?stimulus, "Signal bound");

            tasks.push(tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    debug!(signal = %sig, "Signal received");
                    if tx.send(stimulus).await.is_err() {
                        break;
                    }
                }
            }));
        }

        Ok(Self { tasks })
    }

    #[cfg(not(unix))]
    pub fn spawn(
        settings: &SupervisorSettings,
        stimuli: &mpsc::Sender<Stimulus>,
    ) -> io::Result<Self> {
        let _ = settings;
        let tx = stimuli.clone();
        let task = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx
                    .send(Stimulus::Shutdown {
                        signal: Signal::Interrupt,
                    })
                    .await;
            }
        });
        Ok(Self { tasks: vec![task] })
    }
}

impl Drop for SignalListener {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(unix)]
fn signal_kind(signal: Signal) -> Option<tokio::signal::unix::SignalKind> {
    use tokio::signal::unix::SignalKind;

    match signal {
        Signal::Interrupt => Some(SignalKind::interrupt()),
        Signal::HangUp => Some(SignalKind::hangup()),
        Signal::Terminate => Some(SignalKind::terminate()),
        Signal::Quit => Some(SignalKind::quit()),
        Signal::User1 => Some(SignalKind::user_defined1()),
        Signal::User2 => Some(SignalKind::user_defined2()),
        Signal::Kill => None,
    }
}
