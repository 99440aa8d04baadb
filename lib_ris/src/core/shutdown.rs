//! # Shutdown Coordinator
//!
//! Wraps a `CancellationToken` and a `TaskTracker`. Every long-running unit of
//! work is spawned through the coordinator and watches a child of its token,
//! so a single `request_shutdown()` stops all of them. The token is the only
//! coordination channel between the signal path and the receive loop.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tokio_util::task::TaskTracker;

#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tracker: TaskTracker,
    requested: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that is cancelled when shutdown is requested.
    ///
    /// Holders can observe it but cancelling it only affects that holder.
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Spawns `task` on the runtime and tracks it until it finishes.
    pub fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn(task)
    }

    /// Requests shutdown.
    ///
    /// Returns `true` for the call that initiated it; every later call is a
    /// no-op that returns `false`.
    pub fn request_shutdown(&self) -> bool {
        if self.requested.swap(true, Ordering::AcqRel) {
            log::debug!("Shutdown already in progress, ignoring repeated request.");
            return false;
        }
        log::info!("Disconnecting...");
        self.token.cancel();
        self.tracker.close();
        log::info!("Shutting down...");
        true
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown has been requested.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Stops accepting new tasks and waits for every tracked task to finish.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        log::debug!("All tracked tasks have finished.");
    }

    /// Turns process signals into shutdown requests.
    ///
    /// Listens for Ctrl-C (and SIGTERM on unix) until an error occurs installing
    /// or polling a handler. Repeated signals are forwarded too, and ignored by
    /// `request_shutdown`.
    pub async fn listen_for_signals(&self) -> io::Result<()> {
        #[cfg(unix)]
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;

        loop {
            #[cfg(unix)]
            tokio::select! {
                received = signal::ctrl_c() => {
                    received?;
                    log::info!("Ctrl-C received, initiating shutdown.");
                }
                _ = terminate.recv() => {
                    log::info!("SIGTERM received, initiating shutdown.");
                }
            }

            #[cfg(not(unix))]
            {
                signal::ctrl_c().await?;
                log::info!("Ctrl-C received, initiating shutdown.");
            }

            self.request_shutdown();
        }
    }
}
