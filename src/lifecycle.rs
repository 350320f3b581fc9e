//! Process lifecycle: wait for an interrupt, then stop every client.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::harness::Session;

/// How shutdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// Every tracked task finished within the grace period.
    Drained,
    /// The grace period elapsed with tasks still running; they are abandoned.
    GraceElapsed {
        /// Tasks still alive when shutdown gave up.
        remaining: usize,
    },
}

/// Blocks until an interrupt arrives, then broadcasts cancellation.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    shutdown: CancellationToken,
    tracker: TaskTracker,
    grace: Duration,
}

impl Lifecycle {
    pub fn new(session: &Session) -> Self {
        Self {
            shutdown: session.shutdown().clone(),
            tracker: session.tracker().clone(),
            grace: session.config().timeouts.shutdown_grace,
        }
    }

    /// Wait for ctrl-c, then shut down.
    pub async fn wait_for_interrupt(&self) -> Shutdown {
        self.wait_for(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                // Without a handler the default SIGINT action still ends the process.
                error!(error = %err, "could not listen for interrupt");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Wait for `signal`, cancel all clients, and give them `grace` to finish.
    ///
    /// Never waits longer than the grace period once the signal fired.
    pub async fn wait_for<F>(&self, signal: F) -> Shutdown
    where
        F: Future<Output = ()>,
    {
        signal.await;
        info!("Received an interrupt, stopping services...");

        self.shutdown.cancel();
        self.tracker.close();

        match timeout(self.grace, self.tracker.wait()).await {
            Ok(()) => {
                info!("all clients stopped");
                Shutdown::Drained
            }
            Err(_) => {
                let remaining = self.tracker.len();
                warn!(remaining, grace = ?self.grace, "abandoning clients still running");
                Shutdown::GraceElapsed { remaining }
            }
        }
    }
}
