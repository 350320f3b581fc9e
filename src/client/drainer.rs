//! Inbound drainer: reads and discards everything the server sends.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::connection::Reader;
use super::{Connection, Disconnect};

/// Why a drainer stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainExit {
    /// The connection was closed elsewhere or the harness shut down.
    Cancelled,
    /// The peer sent a close frame.
    Closed(Disconnect),
    /// Reading failed.
    Failed(Disconnect),
    /// The stream ended without a close frame or error.
    Eof,
}

/// Drain `reader` until it closes, fails, or the connection is cancelled,
/// then close the connection.
pub async fn run<S>(connection: Arc<Connection<S>>, mut reader: Reader<S>) -> DrainExit
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let id = connection.id();
    let exit = drain(&connection, &mut reader).await;

    match &exit {
        DrainExit::Failed(disconnect) if disconnect.is_unexpected() => {
            warn!(client = %id, %disconnect, "client closed connection");
        }
        DrainExit::Failed(disconnect) => {
            error!(client = %id, %disconnect, "could not read message");
        }
        DrainExit::Closed(disconnect) => debug!(client = %id, %disconnect, "peer closed"),
        DrainExit::Cancelled | DrainExit::Eof => {}
    }

    connection.close().await;
    info!(client = %id, "closing client");
    exit
}

async fn drain<S>(connection: &Connection<S>, reader: &mut Reader<S>) -> DrainExit
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = connection.cancelled() => return DrainExit::Cancelled,
            next = reader.next() => next,
        };

        match next {
            Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                connection.metrics().frame_received();
            }
            // control frames are answered by the framing layer
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
            Some(Ok(Message::Close(frame))) => {
                let code = frame.map(|frame| u16::from(frame.code));
                if let Some(code) = code {
                    connection.record_peer_close(code);
                }
                return DrainExit::Closed(Disconnect::from_close_code(code));
            }
            Some(Err(err)) => {
                return DrainExit::Failed(Disconnect::classify(&err, connection.peer_close()));
            }
            None => return DrainExit::Eof,
        }
    }
}
