//! Command-line interface.

use std::time::Duration;

use clap::Parser;

use crate::config::{Config, DEFAULT_ADDRESS, DEFAULT_CLIENT_COUNT, DEFAULT_PATH, Timeouts};

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(author, version, about = "Websocket load generator", long_about = None)]
pub struct Cli {
    /// Server address as host:port
    #[arg(long, visible_alias = "address", default_value = DEFAULT_ADDRESS)]
    pub addr: String,

    /// Number of clients to connect
    #[arg(long, visible_alias = "client-count", default_value_t = DEFAULT_CLIENT_COUNT)]
    pub clients: usize,

    /// Request path of the websocket endpoint
    #[arg(long, default_value = DEFAULT_PATH)]
    pub path: String,

    /// Pause before each connection attempt, in milliseconds
    #[arg(long, default_value_t = 50)]
    pub spawn_delay_ms: u64,

    /// Seconds between two heartbeats of one client
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub heartbeat_secs: u64,

    /// Seconds allowed for connect plus upgrade
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub handshake_timeout_secs: u64,

    /// Seconds to wait for clients after an interrupt
    #[arg(long, default_value_t = 2)]
    pub shutdown_grace_secs: u64,
}

impl Cli {
    /// Build the run configuration from the parsed flags.
    pub fn into_config(self) -> Config {
        Config::new()
            .with_address(self.addr)
            .with_path(self.path)
            .with_client_count(self.clients)
            .with_spawn_delay(Duration::from_millis(self.spawn_delay_ms))
            .with_heartbeat_interval(Duration::from_secs(self.heartbeat_secs))
            .with_timeouts(Timeouts {
                handshake: Duration::from_secs(self.handshake_timeout_secs),
                shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
                ..Timeouts::default()
            })
    }
}
