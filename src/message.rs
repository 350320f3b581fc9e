//! Application payloads exchanged with the server under test.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Marker every heartbeat body starts with.
pub const HEARTBEAT_MARKER: &str = "HERE I AM";

/// Identifier of one simulated client, assigned in spawn order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(usize);

impl ClientId {
    /// Wrap a raw index.
    #[must_use]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Heartbeat sent by every client on each tick.
///
/// Serializes as `{"Body": "HERE I AM <id>", "ClientID": <id>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    /// Free-form text; carries the marker and the client id.
    #[serde(rename = "Body")]
    pub body: String,
    /// Sender of the heartbeat.
    #[serde(rename = "ClientID")]
    pub client_id: ClientId,
}

impl Heartbeat {
    /// Heartbeat for `client_id`.
    #[must_use]
    pub fn new(client_id: ClientId) -> Self {
        Self {
            body: format!("{} {}", HEARTBEAT_MARKER, client_id),
            client_id,
        }
    }

    /// Encode as a JSON text payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`](crate::Error::Serialization) if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
