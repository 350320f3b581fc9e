//! Run-wide counters shared by every client task.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Atomic counters updated by clients as they connect, send and drain.
#[derive(Debug)]
pub struct Metrics {
    connections_attempted: AtomicU64,
    connections_established: AtomicU64,
    connections_rejected: AtomicU64,
    connections_failed: AtomicU64,
    connections_active: AtomicUsize,
    heartbeats_sent: AtomicU64,
    frames_received: AtomicU64,
    started: Instant,
}

impl Metrics {
    /// Create a fresh set of counters, starting the run clock now.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connections_attempted: AtomicU64::new(0),
            connections_established: AtomicU64::new(0),
            connections_rejected: AtomicU64::new(0),
            connections_failed: AtomicU64::new(0),
            connections_active: AtomicUsize::new(0),
            heartbeats_sent: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            started: Instant::now(),
        })
    }

    pub fn connection_attempted(&self) {
        self.connections_attempted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_established(&self) {
        self.connections_established.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_rejected(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_failed(&self) {
        self.connections_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Called once per established connection, by whichever task closes it.
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn heartbeat_sent(&self) {
        self.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current values.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            elapsed: self.started.elapsed(),
            attempted: self.connections_attempted.load(Ordering::Relaxed),
            established: self.connections_established.load(Ordering::Relaxed),
            rejected: self.connections_rejected.load(Ordering::Relaxed),
            failed: self.connections_failed.load(Ordering::Relaxed),
            active: self.connections_active.load(Ordering::Relaxed),
            heartbeats_sent: self.heartbeats_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub elapsed: Duration,
    pub attempted: u64,
    pub established: u64,
    pub rejected: u64,
    pub failed: u64,
    pub active: usize,
    pub heartbeats_sent: u64,
    pub frames_received: u64,
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.3}s: {} attempted, {} established, {} rejected, {} failed, {} active, \
             {} heartbeats sent, {} frames received",
            self.elapsed.as_secs_f64(),
            self.attempted,
            self.established,
            self.rejected,
            self.failed,
            self.active,
            self.heartbeats_sent,
            self.frames_received
        )
    }
}
