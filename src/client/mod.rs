//! Simulated clients.
//!
//! A client is one websocket connection driven by two tasks: a heartbeat
//! sender that writes on a fixed interval, and a drainer that reads and
//! discards whatever the server sends. Both share a [`Connection`]; whichever
//! stops first closes it, which cancels the other.

mod connect;
mod connection;
mod disconnect;
pub mod drainer;
pub mod heartbeat;

pub use connect::{Outcome, establish, establish_over, upgrade};
pub use connection::{Connection, Reader};
pub use disconnect::{ABNORMAL_CLOSURE, Disconnect, GOING_AWAY};
pub use drainer::DrainExit;
pub use heartbeat::HeartbeatExit;

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;

use crate::harness::Session;
use crate::message::ClientId;

/// An established client that has not started its tasks yet.
#[derive(Debug)]
pub struct Client<S> {
    connection: Arc<Connection<S>>,
    reader: Reader<S>,
}

/// Handles to a running client's tasks.
#[derive(Debug)]
pub struct ClientTasks {
    pub heartbeat: JoinHandle<HeartbeatExit>,
    pub drainer: JoinHandle<DrainExit>,
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap an upgraded stream for client `id`.
    pub fn new(id: ClientId, ws: WebSocketStream<S>, session: &Session) -> Self {
        let (connection, reader) = Connection::open(
            ws,
            id,
            session.shutdown(),
            session.config().timeouts.close,
            session.metrics().clone(),
        );
        Self { connection, reader }
    }

    pub fn connection(&self) -> &Arc<Connection<S>> {
        &self.connection
    }

    /// Spawn the heartbeat sender and the drainer on the session's tracker.
    pub fn start(self, session: &Session) -> ClientTasks {
        let period = session.config().heartbeat_interval;
        let heartbeat = session
            .tracker()
            .spawn(heartbeat::run(self.connection.clone(), period));
        let drainer = session
            .tracker()
            .spawn(drainer::run(self.connection, self.reader));
        ClientTasks { heartbeat, drainer }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use bytes::BytesMut;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};
    use tokio_tungstenite::WebSocketStream;
    use tokio_tungstenite::tungstenite::protocol::Role;

    use crate::protocol::{HandshakeRequest, compute_accept_key, find_head_end};

    /// Two ends of an in-memory websocket that skipped the HTTP upgrade.
    pub(crate) async fn ws_pair() -> (
        WebSocketStream<DuplexStream>,
        WebSocketStream<DuplexStream>,
    ) {
        ws_pair_with_capacity(64 * 1024).await
    }

    /// Like [`ws_pair`], with `capacity` bytes buffered in each direction.
    pub(crate) async fn ws_pair_with_capacity(
        capacity: usize,
    ) -> (
        WebSocketStream<DuplexStream>,
        WebSocketStream<DuplexStream>,
    ) {
        let (client, server) = duplex(capacity);
        let client = WebSocketStream::from_raw_socket(client, Role::Client, None).await;
        let server = WebSocketStream::from_raw_socket(server, Role::Server, None).await;
        (client, server)
    }

    /// Read an upgrade request head from `stream`.
    pub(crate) async fn read_request(stream: &mut DuplexStream) -> HandshakeRequest {
        let mut buf = BytesMut::new();
        let end = loop {
            if let Some(end) = find_head_end(&buf) {
                break end;
            }
            assert_ne!(stream.read_buf(&mut buf).await.unwrap(), 0, "request truncated");
        };
        let head = std::str::from_utf8(&buf[..end]).unwrap();

        let mut lines = head.lines();
        let path = lines
            .next()
            .and_then(|line| line.split(' ').nth(1))
            .unwrap()
            .to_string();
        let mut request = HandshakeRequest {
            path,
            host: String::new(),
            key: String::new(),
        };
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                match name.trim().to_ascii_lowercase().as_str() {
                    "host" => request.host = value.trim().to_string(),
                    "sec-websocket-key" => request.key = value.trim().to_string(),
                    _ => {}
                }
            }
        }
        request
    }

    /// Answer an upgrade request with 101 and return the server side.
    pub(crate) async fn accept_upgrade(mut stream: DuplexStream) -> WebSocketStream<DuplexStream> {
        let request = read_request(&mut stream).await;
        let response = format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {}\r\n\r\n",
            compute_accept_key(&request.key)
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        WebSocketStream::from_raw_socket(stream, Role::Server, None).await
    }
}
