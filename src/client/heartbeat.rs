//! Periodic heartbeat sender.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tokio_tungstenite::tungstenite::Error as WsError;
use tracing::{debug, error, trace, warn};

use super::{Connection, Disconnect};
use crate::message::Heartbeat;

/// Why a heartbeat sender stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatExit {
    /// The connection was closed elsewhere or the harness shut down.
    Cancelled,
    /// A write failed; the sender does not retry.
    WriteFailed(Disconnect),
}

/// Send a heartbeat every `period`, the first one a full `period` after start.
///
/// A write that has not completed within one `period` counts as failed.
/// Closes the connection on every exit path.
pub async fn run<S>(connection: Arc<Connection<S>>, period: Duration) -> HeartbeatExit
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let exit = beat(&connection, period).await;
    connection.close().await;
    exit
}

async fn beat<S>(connection: &Connection<S>, period: Duration) -> HeartbeatExit
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let id = connection.id();
    // the payload never changes for a given client
    let payload = match Heartbeat::new(id).to_json() {
        Ok(payload) => payload,
        Err(err) => {
            error!(client = %id, error = %err, "could not encode heartbeat");
            return HeartbeatExit::WriteFailed(Disconnect::Failed(err.to_string()));
        }
    };

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = connection.cancelled() => return HeartbeatExit::Cancelled,
            _ = ticker.tick() => {}
        }

        // a peer that stops reading must not pin the writer past shutdown
        let sent = tokio::select! {
            biased;
            _ = connection.cancelled() => return HeartbeatExit::Cancelled,
            sent = timeout(period, connection.send_text(payload.clone())) => sent,
        };
        match sent {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return write_failed(connection, &err),
            Err(_) => {
                error!(client = %id, timeout = ?period, "heartbeat write stalled");
                return HeartbeatExit::WriteFailed(Disconnect::Failed(format!(
                    "write timed out after {:?}",
                    period
                )));
            }
        }
        connection.metrics().heartbeat_sent();
        trace!(client = %id, "heartbeat sent");
    }
}

fn write_failed<S>(connection: &Connection<S>, err: &WsError) -> HeartbeatExit
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let id = connection.id();
    if connection.is_closed() && matches!(err, WsError::AlreadyClosed | WsError::ConnectionClosed) {
        // the drainer closed it between the tick and the write
        debug!(client = %id, "connection closed before heartbeat write");
        return HeartbeatExit::Cancelled;
    }

    let disconnect = Disconnect::classify(err, connection.peer_close());
    if disconnect.is_unexpected() {
        warn!(client = %id, %disconnect, "client closed connection");
    } else {
        error!(client = %id, %disconnect, error = %err, "could not write heartbeat");
    }
    HeartbeatExit::WriteFailed(disconnect)
}
