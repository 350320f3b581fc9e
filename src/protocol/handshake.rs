//! Client side of the WebSocket opening handshake (RFC 6455 Section 4.1).
//!
//! Only the HTTP parts live here; the framing after a successful upgrade is
//! handled by `tokio-tungstenite`. A non-101 answer is turned into an
//! [`UpgradeRejection`] carrying the diagnostics a load test wants to see.

use std::collections::HashMap;
use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use crate::config::Endpoint;
use crate::error::{Error, Result};

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Parse HTTP header lines into a map keyed by lowercase header name.
///
/// Parsing stops at the first empty line. Repeated headers keep the last value.
fn parse_headers<'a, I>(lines: I) -> HashMap<String, String>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers = HashMap::new();

    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_lowercase(), value.trim().to_string());
        }
    }

    headers
}

/// Reject header values that would let a caller inject extra header lines.
fn validate_header_value(header_name: &str, value: &str) -> Result<()> {
    if value.contains('\r') || value.contains('\n') {
        return Err(Error::InvalidHandshake(format!(
            "{} contains CR or LF characters",
            header_name
        )));
    }
    Ok(())
}

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use wsload::protocol::compute_accept_key;
///
/// let accept = compute_accept_key("dGhlIHNhbXBsZSBub25jZQ==");
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Generate a fresh Sec-WebSocket-Key: 16 random bytes, base64 encoded.
///
/// # Errors
///
/// Returns [`Error::Io`] if the system random source is unavailable.
pub fn generate_key() -> Result<String> {
    let mut nonce = [0u8; 16];
    getrandom::getrandom(&mut nonce).map_err(|e| Error::Io(e.to_string()))?;
    Ok(BASE64.encode(nonce))
}

/// Position just past the blank line that ends an HTTP head, if present.
#[must_use]
pub fn find_head_end(data: &[u8]) -> Option<usize> {
    data.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

/// Upgrade request sent by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// The request path (e.g., "/ws").
    pub path: String,
    /// The Host header value.
    pub host: String,
    /// The Sec-WebSocket-Key header value.
    pub key: String,
}

impl HandshakeRequest {
    /// Build a request for `endpoint` with a freshly generated key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if no key could be generated.
    pub fn client(endpoint: &Endpoint) -> Result<Self> {
        Ok(Self {
            path: endpoint.path().to_string(),
            host: endpoint.host().to_string(),
            key: generate_key()?,
        })
    }

    /// Write the HTTP request to a buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if the host or path contain CR/LF.
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        validate_header_value("Request path", &self.path)?;
        validate_header_value("Host", &self.host)?;

        buf.extend_from_slice(format!("GET {} HTTP/1.1\r\n", self.path).as_bytes());
        buf.extend_from_slice(format!("Host: {}\r\n", self.host).as_bytes());
        buf.extend_from_slice(b"Upgrade: websocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(format!("Sec-WebSocket-Key: {}\r\n", self.key).as_bytes());
        buf.extend_from_slice(b"Sec-WebSocket-Version: 13\r\n");
        buf.extend_from_slice(b"\r\n");
        Ok(())
    }

    /// The Sec-WebSocket-Accept value a compliant server answers with.
    #[must_use]
    pub fn expected_accept(&self) -> String {
        compute_accept_key(&self.key)
    }
}

/// Status line and headers of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    /// Numeric status code.
    pub status: u16,
    /// Reason phrase, possibly empty.
    pub reason: String,
    headers: HashMap<String, String>,
}

impl ResponseHead {
    /// Parse a response head (status line plus headers).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if the status line is missing or
    /// the status code is not numeric. Header values may carry obs-text; bytes
    /// that are not UTF-8 are replaced rather than rejected.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(data);

        let mut lines = text.lines();

        // "HTTP/1.1 101 Switching Protocols"
        let status_line = lines
            .next()
            .filter(|line| !line.is_empty())
            .ok_or_else(|| Error::InvalidHandshake("Empty response".into()))?;

        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or_default();
        if !version.starts_with("HTTP/1.") {
            return Err(Error::InvalidHandshake(format!(
                "Invalid status line: {}",
                status_line
            )));
        }

        let status = parts
            .next()
            .and_then(|code| code.parse::<u16>().ok())
            .ok_or_else(|| {
                Error::InvalidHandshake(format!("Invalid status line: {}", status_line))
            })?;
        let reason = parts.next().unwrap_or_default().trim().to_string();

        Ok(Self {
            status,
            reason,
            headers: parse_headers(lines),
        })
    }

    /// Look up a header value, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Returns `true` for `101 Switching Protocols`.
    #[must_use]
    pub const fn is_switching_protocols(&self) -> bool {
        self.status == 101
    }

    /// Declared body length, if the server sent a valid Content-Length.
    #[must_use]
    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length")
            .and_then(|value| value.parse().ok())
    }
}

/// A validated `101 Switching Protocols` answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// The Sec-WebSocket-Accept value.
    pub accept: String,
}

impl HandshakeResponse {
    /// Validate a 101 response head against the request that produced it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if:
    /// - The status is not 101.
    /// - `Upgrade` is missing or not `websocket`.
    /// - `Connection` is missing or does not contain `upgrade`.
    /// - `Sec-WebSocket-Accept` is missing or does not match the request key.
    pub fn from_head(head: &ResponseHead, request: &HandshakeRequest) -> Result<Self> {
        if !head.is_switching_protocols() {
            return Err(Error::InvalidHandshake(format!(
                "Expected 101 status, got: {}",
                head.status
            )));
        }

        let upgrade = head
            .header("upgrade")
            .ok_or_else(|| Error::InvalidHandshake("Missing Upgrade header in response".into()))?;
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return Err(Error::InvalidHandshake(format!(
                "Invalid Upgrade header: {}",
                upgrade
            )));
        }

        let connection = head.header("connection").ok_or_else(|| {
            Error::InvalidHandshake("Missing Connection header in response".into())
        })?;
        if !connection.to_lowercase().contains("upgrade") {
            return Err(Error::InvalidHandshake(format!(
                "Invalid Connection header: {}",
                connection
            )));
        }

        let accept = head
            .header("sec-websocket-accept")
            .ok_or_else(|| Error::InvalidHandshake("Missing Sec-WebSocket-Accept header".into()))?
            .to_string();
        if accept != request.expected_accept() {
            return Err(Error::InvalidHandshake(
                "Invalid Sec-WebSocket-Accept".into(),
            ));
        }

        Ok(Self { accept })
    }
}

/// Diagnostics captured when a server refuses the upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRejection {
    /// HTTP status code.
    pub status: u16,
    /// Reason phrase.
    pub reason: String,
    /// `Upgrade` response header.
    pub upgrade: Option<String>,
    /// `Connection` response header.
    pub connection: Option<String>,
    /// `Sec-WebSocket-Accept` response header.
    pub accept: Option<String>,
    /// Start of the response body, lossily decoded.
    pub body: String,
}

impl UpgradeRejection {
    /// Build a rejection from a response head and whatever body was read.
    ///
    /// At most `max_body` bytes are kept and the body is cut at the first NUL.
    #[must_use]
    pub fn new(head: &ResponseHead, body: &[u8], max_body: usize) -> Self {
        let body = &body[..body.len().min(max_body)];
        let body = body
            .iter()
            .position(|&b| b == 0)
            .map_or(body, |nul| &body[..nul]);

        Self {
            status: head.status,
            reason: head.reason.clone(),
            upgrade: head.header("upgrade").map(str::to_string),
            connection: head.header("connection").map(str::to_string),
            accept: head.header("sec-websocket-accept").map(str::to_string),
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }
}

impl fmt::Display for UpgradeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "status {} {}, upgrade: {}, connection: {}, accept: {}, body: {:?}",
            self.status,
            self.reason,
            self.upgrade.as_deref().unwrap_or("-"),
            self.connection.as_deref().unwrap_or("-"),
            self.accept.as_deref().unwrap_or("-"),
            self.body
        )
    }
}
