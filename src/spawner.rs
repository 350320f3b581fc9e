//! Staggered launch of connection attempts.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::harness::Session;
use crate::message::ClientId;

/// Launches `client_count` attempts, pausing `spawn_delay` before each one.
///
/// Attempts are fire-and-forget: the spawner never waits for an attempt to
/// succeed or fail before starting the next.
#[derive(Debug, Clone)]
pub struct Spawner {
    count: usize,
    delay: Duration,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl Spawner {
    pub fn new(session: &Session) -> Self {
        Self {
            count: session.config().client_count,
            delay: session.config().spawn_delay,
            tracker: session.tracker().clone(),
            shutdown: session.shutdown().clone(),
        }
    }

    /// Call `launch` for ids `0..count`, spawning each returned future as a
    /// tracked task. Returns how many attempts were launched; fewer than
    /// `count` only if shutdown was requested first.
    pub async fn run<F, Fut>(&self, mut launch: F) -> usize
    where
        F: FnMut(ClientId) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut launched = 0;

        for index in 0..self.count {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    debug!(launched, "spawner cancelled");
                    break;
                }
                _ = tokio::time::sleep(self.delay) => {}
            }

            self.tracker.spawn(launch(ClientId::new(index)));
            launched += 1;
        }

        launched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn session(count: usize, delay: Duration) -> Session {
        Session::new(
            Config::new()
                .with_client_count(count)
                .with_spawn_delay(delay),
        )
        .unwrap()
    }

    fn recorder() -> (
        Arc<Mutex<Vec<(ClientId, Instant)>>>,
        impl FnMut(ClientId) -> std::future::Ready<()>,
    ) {
        let launches = Arc::new(Mutex::new(Vec::new()));
        let sink = launches.clone();
        let launch = move |id| {
            sink.lock().unwrap().push((id, Instant::now()));
            std::future::ready(())
        };
        (launches, launch)
    }

    #[tokio::test(start_paused = true)]
    async fn test_launches_are_staggered() {
        let delay = Duration::from_millis(50);
        let session = session(5, delay);
        let (launches, launch) = recorder();

        let start = Instant::now();
        let launched = Spawner::new(&session).run(launch).await;

        assert_eq!(launched, 5);
        let launches = launches.lock().unwrap();
        assert_eq!(launches.len(), 5);
        assert!(launches[0].1 - start >= delay);
        for (index, pair) in launches.windows(2).enumerate() {
            assert_eq!(pair[0].0, ClientId::new(index));
            assert!(pair[1].1 - pair[0].1 >= delay);
        }
        assert!(start.elapsed() >= delay * 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_clients() {
        let session = session(0, Duration::from_millis(50));
        let (launches, launch) = recorder();

        let start = Instant::now();
        assert_eq!(Spawner::new(&session).run(launch).await, 0);
        assert!(launches.lock().unwrap().is_empty());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_shutdown() {
        let session = session(10, Duration::from_millis(50));
        let (launches, launch) = recorder();

        let token = session.shutdown().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            token.cancel();
        });

        let launched = Spawner::new(&session).run(launch).await;
        assert_eq!(launched, 2);
        assert_eq!(launches.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_launched_tasks_are_tracked() {
        let session = session(3, Duration::from_millis(10));
        let spawner = Spawner::new(&session);

        spawner
            .run(|_| tokio::time::sleep(Duration::from_secs(1)))
            .await;

        assert_eq!(session.tracker().len(), 3);
        session.tracker().close();
        session.tracker().wait().await;
        assert!(session.tracker().is_empty());
    }
}
