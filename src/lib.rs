//! # wsload - concurrent-connection load generator for WebSocket servers
//!
//! `wsload` opens many client connections to a single `ws://` endpoint and
//! keeps each one alive with a periodic JSON heartbeat, while reading and
//! discarding whatever the server sends back.
//!
//! ## Features
//!
//! - **Staggered connects** so the server is not hit by one burst
//! - **Independent clients**: a failed or closed connection never affects the others
//! - **Classified disconnects** separating abnormal closure from normal close
//! - **Diagnostics for rejected upgrades** (status, upgrade headers, body excerpt)
//! - **Bounded shutdown** on ctrl-c
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wsload::{Config, Harness};
//!
//! let config = Config::new()
//!     .with_address("127.0.0.1:9001")
//!     .with_client_count(500);
//! let report = Harness::new(config)?.run_until_interrupt().await;
//! println!("{report}");
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod harness;
pub mod lifecycle;
pub mod message;
pub mod metrics;
pub mod protocol;
pub mod spawner;
pub mod trace;

pub use client::{Disconnect, DrainExit, HeartbeatExit, Outcome, establish, establish_over};
pub use config::{Config, Endpoint, Limits, Timeouts};
pub use error::{Error, Result};
pub use harness::{Harness, Session};
pub use lifecycle::{Lifecycle, Shutdown};
pub use message::{ClientId, Heartbeat};
pub use metrics::{Metrics, MetricsSnapshot};
pub use protocol::{UpgradeRejection, compute_accept_key};
pub use spawner::Spawner;

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn test_public_types_are_send() {
        assert_send::<Error>();
        assert_send::<Config>();
        assert_send::<Session>();
        assert_send::<Harness>();
        assert_send::<Outcome>();
        assert_send::<Disconnect>();
        assert_send::<Heartbeat>();
        assert_send::<MetricsSnapshot>();
        assert_send::<client::Connection<tokio::net::TcpStream>>();
    }

    #[test]
    fn test_public_types_are_sync() {
        assert_sync::<Error>();
        assert_sync::<Config>();
        assert_sync::<Session>();
        assert_sync::<Metrics>();
        assert_sync::<UpgradeRejection>();
        assert_sync::<client::Connection<tokio::net::TcpStream>>();
    }
}
