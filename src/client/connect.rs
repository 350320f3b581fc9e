//! One connection attempt: TCP connect, HTTP upgrade, start the client.

use std::future::Future;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::protocol::Role;
use tracing::{debug, error, warn};

use super::Client;
use crate::config::{Config, Endpoint};
use crate::error::{Error, Result};
use crate::harness::Session;
use crate::message::ClientId;
use crate::protocol::{
    HandshakeRequest, HandshakeResponse, ResponseHead, UpgradeRejection, find_head_end,
};

/// How a connection attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Upgrade succeeded; the sender and drainer are running.
    Established,
    /// The server answered with a status other than 101.
    Rejected(UpgradeRejection),
    /// Connect, timeout, or malformed handshake.
    Failed(Error),
    /// Shutdown was requested before the attempt finished.
    Cancelled,
}

/// Dial the session's endpoint over TCP and run the attempt.
///
/// The attempt is final: failures are logged and the slot is abandoned.
pub async fn establish(id: ClientId, session: &Session) -> Outcome {
    let addr = session.endpoint().socket_addr();
    attempt(id, session, async move {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok::<_, Error>(stream)
    })
    .await
}

/// Run the attempt over an already connected stream.
pub async fn establish_over<S>(stream: S, id: ClientId, session: &Session) -> Outcome
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    attempt(id, session, std::future::ready(Ok(stream))).await
}

async fn attempt<S, D>(id: ClientId, session: &Session, dial: D) -> Outcome
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    D: Future<Output = Result<S>>,
{
    let config = session.config();
    let metrics = session.metrics();
    metrics.connection_attempted();

    let handshake = async {
        let stream = dial.await?;
        upgrade(stream, session.endpoint(), config).await
    };
    let limit = config.timeouts.handshake;
    let result = tokio::select! {
        biased;
        _ = session.shutdown().cancelled() => {
            debug!(client = %id, "connection attempt cancelled");
            return Outcome::Cancelled;
        }
        result = timeout(limit, handshake) => result.unwrap_or(Err(Error::Timeout(limit))),
    };

    match result {
        Ok(ws) => {
            debug!(client = %id, "connected");
            Client::new(id, ws, session).start(session);
            Outcome::Established
        }
        Err(Error::UpgradeRejected(rejection)) => {
            metrics.connection_rejected();
            warn!(client = %id, %rejection, "websocket upgrade rejected");
            Outcome::Rejected(*rejection)
        }
        Err(err) => {
            metrics.connection_failed();
            error!(client = %id, error = %err, "dial error");
            Outcome::Failed(err)
        }
    }
}

/// Perform the client side of the upgrade on `stream`.
///
/// Bytes the server sent after the response head are handed to the framing
/// layer.
///
/// # Errors
///
/// Returns [`Error::UpgradeRejected`] for a non-101 status,
/// [`Error::HandshakeTooLarge`] if the head exceeds the limit, and
/// [`Error::InvalidHandshake`] for a malformed or truncated response.
pub async fn upgrade<S>(
    mut stream: S,
    endpoint: &Endpoint,
    config: &Config,
) -> Result<WebSocketStream<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = HandshakeRequest::client(endpoint)?;
    let mut out = Vec::with_capacity(256);
    request.write(&mut out)?;
    stream.write_all(&out).await?;
    stream.flush().await?;

    let mut buf = BytesMut::with_capacity(1024);
    let head_len = loop {
        if stream.read_buf(&mut buf).await? == 0 {
            return Err(Error::InvalidHandshake(
                "connection closed during handshake".into(),
            ));
        }
        if let Some(end) = find_head_end(&buf) {
            break end;
        }
        config.limits.check_handshake_size(buf.len())?;
    };
    config.limits.check_handshake_size(head_len)?;

    let rest = buf.split_off(head_len);
    let head = ResponseHead::parse(&buf)?;

    if !head.is_switching_protocols() {
        let body = read_rejection_body(&mut stream, &head, rest, config).await;
        let rejection = UpgradeRejection::new(&head, &body, config.limits.max_rejection_body);
        return Err(rejection.into());
    }

    let response = HandshakeResponse::from_head(&head, &request)?;
    debug!(accept = %response.accept, "upgrade accepted");
    Ok(WebSocketStream::from_partially_read(stream, rest.to_vec(), Role::Client, None).await)
}

/// Read up to `max_rejection_body` bytes of a rejection body, stopping at the
/// declared length, end of stream, or the body timeout, whichever is first.
async fn read_rejection_body<S>(
    stream: &mut S,
    head: &ResponseHead,
    mut body: BytesMut,
    config: &Config,
) -> BytesMut
where
    S: AsyncRead + Unpin,
{
    let max = config.limits.max_rejection_body;
    let wanted = head.content_length().map_or(max, |len| len.min(max));

    let read = async {
        while body.len() < wanted {
            match stream.read_buf(&mut body).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) => {
                    debug!(error = %err, "rejection body read failed");
                    break;
                }
            }
        }
    };
    if timeout(config.timeouts.rejection_body, read).await.is_err() {
        debug!("rejection body read timed out");
    }

    body.truncate(wanted);
    body
}
