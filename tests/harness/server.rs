//! Scripted websocket server on a random local port.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use wsload::Heartbeat;

/// What the server does with each incoming connection.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Upgrade, optionally send one text frame, then report every heartbeat.
    Accept { greeting: Option<String> },
    /// Refuse the upgrade with `426 Upgrade Required`.
    Reject,
    /// Upgrade, then immediately close with `code`.
    CloseWith(u16),
}

/// Something the server observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connected,
    Heartbeat(Heartbeat),
    Closed,
}

pub struct TestServer {
    addr: SocketAddr,
    events: mpsc::UnboundedReceiver<Event>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, events) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let behavior = behavior.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    match behavior {
                        Behavior::Accept { greeting } => accept(stream, greeting, tx).await,
                        Behavior::Reject => reject(stream).await,
                        Behavior::CloseWith(code) => close_with(stream, code, tx).await,
                    }
                });
            }
        });

        Self {
            addr,
            events,
            handle,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Next event, or `None` if nothing arrives within `within`.
    pub async fn next_event(&mut self, within: Duration) -> Option<Event> {
        tokio::time::timeout(within, self.events.recv())
            .await
            .ok()
            .flatten()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn accept(stream: TcpStream, greeting: Option<String>, tx: mpsc::UnboundedSender<Event>) {
    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    let _ = tx.send(Event::Connected);

    if let Some(greeting) = greeting {
        if ws.send(Message::Text(greeting)).await.is_err() {
            return;
        }
    }

    while let Some(Ok(message)) = ws.next().await {
        match message {
            Message::Text(text) => {
                if let Ok(heartbeat) = serde_json::from_str::<Heartbeat>(&text) {
                    let _ = tx.send(Event::Heartbeat(heartbeat));
                }
            }
            Message::Close(_) => {
                let _ = tx.send(Event::Closed);
                break;
            }
            _ => {}
        }
    }
}

async fn reject(mut stream: TcpStream) {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&chunk[..n]),
        }
    }

    let body = "websocket upgrades are disabled";
    let response = format!(
        "HTTP/1.1 426 Upgrade Required\r\n\
         Upgrade: required\r\n\
         Content-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

async fn close_with(stream: TcpStream, code: u16, tx: mpsc::UnboundedSender<Event>) {
    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    let _ = tx.send(Event::Connected);

    let frame = CloseFrame {
        code: CloseCode::from(code),
        reason: "".into(),
    };
    if ws.send(Message::Close(Some(frame))).await.is_err() {
        return;
    }
    // wait for the client's reply
    while let Some(Ok(_)) = ws.next().await {}
    let _ = tx.send(Event::Closed);
}
