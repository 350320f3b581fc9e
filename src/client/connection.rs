//! Write half of a client's websocket, shared by its sender and drainer.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::time::Duration;

use futures_util::SinkExt;
use futures_util::StreamExt;
use futures_util::stream::{SplitSink, SplitStream};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::message::ClientId;
use crate::metrics::Metrics;

/// Read half handed to the drainer.
pub type Reader<S> = SplitStream<WebSocketStream<S>>;

type Writer<S> = SplitSink<WebSocketStream<S>, Message>;

/// An established connection.
///
/// Closing is idempotent: the first [`close`](Connection::close) cancels the
/// connection's token, sends a close frame and shuts the sink; later calls
/// return immediately.
pub struct Connection<S> {
    id: ClientId,
    writer: Mutex<Writer<S>>,
    closed: AtomicBool,
    // 0 until the peer sends a close frame with a code
    peer_close: AtomicU16,
    cancel: CancellationToken,
    close_timeout: Duration,
    metrics: Arc<Metrics>,
}

impl<S> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("closed", &self.closed)
            .field("peer_close", &self.peer_close)
            .finish_non_exhaustive()
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Split `ws` and wrap the write half. Counts the connection as
    /// established; the matching decrement happens on the first close.
    ///
    /// The connection's token is a child of `parent`, so a harness shutdown
    /// reaches it while a local close does not escape it.
    pub fn open(
        ws: WebSocketStream<S>,
        id: ClientId,
        parent: &CancellationToken,
        close_timeout: Duration,
        metrics: Arc<Metrics>,
    ) -> (Arc<Self>, Reader<S>) {
        let (writer, reader) = ws.split();
        metrics.connection_established();
        let connection = Arc::new(Self {
            id,
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
            peer_close: AtomicU16::new(0),
            cancel: parent.child_token(),
            close_timeout,
            metrics,
        });
        (connection, reader)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once the connection is closed or the harness shuts down.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Send one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::AlreadyClosed`] after [`close`](Connection::close),
    /// otherwise whatever the framing layer reports.
    pub async fn send_text(&self, text: String) -> Result<(), WsError> {
        if self.is_closed() {
            return Err(WsError::AlreadyClosed);
        }
        let mut writer = self.writer.lock().await;
        writer.send(Message::Text(text)).await
    }

    /// Remember the code from the peer's close frame.
    pub fn record_peer_close(&self, code: u16) {
        self.peer_close.store(code, Ordering::Release);
    }

    /// Close code the peer sent, if any.
    pub fn peer_close(&self) -> Option<u16> {
        match self.peer_close.load(Ordering::Acquire) {
            0 => None,
            code => Some(code),
        }
    }

    /// Close the connection. Returns `true` for the call that performed the
    /// teardown and `false` for every later one.
    ///
    /// Waiting for the write lock and flushing the close frame are both
    /// bounded by the close timeout; failures are only logged.
    pub async fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.cancel.cancel();
        self.metrics.connection_closed();

        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        let teardown = async {
            let mut writer = self.writer.lock().await;
            writer.send(Message::Close(Some(frame))).await?;
            writer.close().await
        };
        match timeout(self.close_timeout, teardown).await {
            Ok(Ok(())) => debug!(client = %self.id, "connection closed"),
            Ok(Err(err)) => debug!(client = %self.id, error = %err, "close frame not delivered"),
            Err(_) => debug!(client = %self.id, timeout = ?self.close_timeout, "close timed out"),
        }
        true
    }
}
