//! Configuration for a load run.
//!
//! A [`Config`] is built once at startup (usually from the command line) and
//! passed by value into the harness; nothing reads configuration from globals.

use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default server address.
pub const DEFAULT_ADDRESS: &str = "18.217.77.98:80";

/// Default request path of the websocket endpoint.
pub const DEFAULT_PATH: &str = "/ws";

/// Default number of simulated clients.
pub const DEFAULT_CLIENT_COUNT: usize = 100;

/// Size limits applied while talking HTTP to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum size of the upgrade response head in bytes.
    ///
    /// Default: 8 KB (8192)
    pub max_handshake_size: usize,

    /// Maximum number of rejection body bytes kept for diagnostics.
    ///
    /// Default: 1024
    pub max_rejection_body: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_handshake_size: 8192,
            max_rejection_body: 1024,
        }
    }
}

impl Limits {
    /// Validate that a response head is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeTooLarge`] if `size` exceeds the configured maximum.
    pub const fn check_handshake_size(&self, size: usize) -> Result<()> {
        if size > self.max_handshake_size {
            Err(Error::HandshakeTooLarge {
                size,
                max: self.max_handshake_size,
            })
        } else {
            Ok(())
        }
    }
}

/// Timeouts enforced by the harness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// TCP connect plus upgrade handshake.
    ///
    /// Default: 10 seconds
    pub handshake: Duration,

    /// Reading the body of a rejected upgrade.
    ///
    /// Default: 1 second
    pub rejection_body: Duration,

    /// Sending the close frame when a client tears down.
    ///
    /// Default: 1 second
    pub close: Duration,

    /// How long shutdown waits for clients after an interrupt.
    ///
    /// Default: 2 seconds
    pub shutdown_grace: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(10),
            rejection_body: Duration::from_secs(1),
            close: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

/// Harness configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Server address as `host:port`.
    pub address: String,

    /// Request path of the websocket endpoint.
    pub path: String,

    /// Number of clients to spawn.
    ///
    /// Default: 100
    pub client_count: usize,

    /// Pause before each connection attempt.
    ///
    /// Default: 50 ms
    pub spawn_delay: Duration,

    /// Interval between two heartbeats of one client.
    ///
    /// Default: 5 seconds
    pub heartbeat_interval: Duration,

    /// Size limits.
    pub limits: Limits,

    /// Timeouts.
    pub timeouts: Timeouts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            path: DEFAULT_PATH.to_string(),
            client_count: DEFAULT_CLIENT_COUNT,
            spawn_delay: Duration::from_millis(50),
            heartbeat_interval: Duration::from_secs(5),
            limits: Limits::default(),
            timeouts: Timeouts::default(),
        }
    }
}

impl Config {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server address.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set the endpoint path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the number of clients.
    #[must_use]
    pub const fn with_client_count(mut self, count: usize) -> Self {
        self.client_count = count;
        self
    }

    /// Set the pause before each connection attempt.
    #[must_use]
    pub const fn with_spawn_delay(mut self, delay: Duration) -> Self {
        self.spawn_delay = delay;
        self
    }

    /// Set the heartbeat interval.
    #[must_use]
    pub const fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set custom limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set timeout configuration.
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Check values the harness cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a zero heartbeat interval and
    /// [`Error::InvalidAddress`] if the endpoint does not resolve.
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "heartbeat interval must be non-zero".into(),
            ));
        }
        self.endpoint().map(|_| ())
    }

    /// Resolve the websocket endpoint the clients connect to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address or path is malformed.
    pub fn endpoint(&self) -> Result<Endpoint> {
        Endpoint::new(&self.address, &self.path)
    }
}

/// A `ws://` endpoint: host (with optional port) and request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    path: String,
}

impl Endpoint {
    /// Build an endpoint from a `host[:port]` string and a path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the host is empty or contains
    /// characters that cannot appear in an authority, or if the path does not
    /// start with `/`.
    pub fn new(host: &str, path: &str) -> Result<Self> {
        let host = host.trim();
        if host.is_empty() {
            return Err(Error::InvalidAddress("empty host".into()));
        }
        if host
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '@'))
        {
            return Err(Error::InvalidAddress(format!("invalid host: {}", host)));
        }
        if !path.starts_with('/') || path.chars().any(char::is_whitespace) {
            return Err(Error::InvalidAddress(format!("invalid path: {}", path)));
        }
        Ok(Self {
            host: host.to_string(),
            path: path.to_string(),
        })
    }

    /// Value of the `Host` header.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Request path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Address to dial; port 80 is assumed when none is given.
    #[must_use]
    pub fn socket_addr(&self) -> String {
        let has_port = if self.host.starts_with('[') {
            self.host.contains("]:")
        } else {
            self.host.contains(':')
        };
        if has_port {
            self.host.clone()
        } else {
            format!("{}:80", self.host)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ws://{}{}", self.host, self.path)
    }
}
