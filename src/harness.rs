//! Wiring of one load run: shared session state plus the top-level driver.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::client::establish;
use crate::config::{Config, Endpoint};
use crate::error::Result;
use crate::lifecycle::{Lifecycle, Shutdown};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::spawner::Spawner;

/// State shared by every task of a run.
///
/// Cloning is cheap; all clones observe the same cancellation token, task
/// tracker and counters.
#[derive(Debug, Clone)]
pub struct Session {
    config: Arc<Config>,
    endpoint: Arc<Endpoint>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    metrics: Arc<Metrics>,
}

impl Session {
    /// Validate `config` and set up a fresh session.
    ///
    /// # Errors
    ///
    /// Returns the validation error if the configuration is unusable.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let endpoint = config.endpoint()?;
        Ok(Self {
            config: Arc::new(config),
            endpoint: Arc::new(endpoint),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            metrics: Metrics::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Tracker every spawned task of the run is registered with.
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Root token; cancelling it stops the spawner and every client.
    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}

/// Top-level driver: spawns the clients and waits for an interrupt.
///
/// ```rust,ignore
/// let harness = Harness::new(Config::new().with_client_count(10))?;
/// let report = harness.run_until_interrupt().await;
/// println!("{report}");
/// ```
#[derive(Debug, Clone)]
pub struct Harness {
    session: Session,
}

impl Harness {
    /// Create a harness for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            session: Session::new(config)?,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run until the process receives ctrl-c.
    pub async fn run_until_interrupt(self) -> MetricsSnapshot {
        let lifecycle = Lifecycle::new(&self.session);
        self.run_with(lifecycle.wait_for_interrupt()).await
    }

    /// Run until `interrupt` completes, then shut down.
    pub async fn run<F>(self, interrupt: F) -> MetricsSnapshot
    where
        F: Future<Output = ()>,
    {
        let lifecycle = Lifecycle::new(&self.session);
        self.run_with(lifecycle.wait_for(interrupt)).await
    }

    async fn run_with<F>(self, shutdown: F) -> MetricsSnapshot
    where
        F: Future<Output = Shutdown>,
    {
        let session = self.session;
        info!("Connecting to: {}", session.endpoint());

        let spawner = Spawner::new(&session);
        let clients = session.clone();
        session.tracker().spawn(async move {
            let launched = spawner
                .run(move |id| {
                    let session = clients.clone();
                    async move {
                        establish(id, &session).await;
                    }
                })
                .await;
            debug!(launched, "spawner finished");
        });

        let outcome = shutdown.await;
        debug!(?outcome, "shutdown finished");
        session.metrics().snapshot()
    }
}
