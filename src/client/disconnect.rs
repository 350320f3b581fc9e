//! Classification of how a connection ended.

use std::fmt;
use std::io::ErrorKind;

use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::error::ProtocolError;

/// Close code for a connection that dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code for a peer that is going away.
pub const GOING_AWAY: u16 = 1001;

/// Why a client's read or write loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disconnect {
    /// Abnormal closure (1006) or going away (1001).
    Unexpected {
        /// The close code.
        code: u16,
    },
    /// Any other closure, with the peer's code if it sent one.
    Normal {
        /// The close code, if known.
        code: Option<u16>,
    },
    /// Transport or protocol failure that is not a closure.
    Failed(String),
}

impl Disconnect {
    /// Classify a close code reported by the peer.
    #[must_use]
    pub const fn from_close_code(code: Option<u16>) -> Self {
        match code {
            Some(code @ (ABNORMAL_CLOSURE | GOING_AWAY)) => Disconnect::Unexpected { code },
            code => Disconnect::Normal { code },
        }
    }

    /// Classify a framing-layer error.
    ///
    /// `peer_close` is the code from a close frame the peer already sent, if
    /// any; it decides the class of errors that only say "closed".
    #[must_use]
    pub fn classify(err: &WsError, peer_close: Option<u16>) -> Self {
        match err {
            WsError::ConnectionClosed
            | WsError::AlreadyClosed
            | WsError::Protocol(ProtocolError::SendAfterClosing) => {
                Self::from_close_code(peer_close)
            }
            WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
                Disconnect::Unexpected {
                    code: ABNORMAL_CLOSURE,
                }
            }
            WsError::Io(io) if is_abrupt(io.kind()) => Disconnect::Unexpected {
                code: ABNORMAL_CLOSURE,
            },
            other => Disconnect::Failed(other.to_string()),
        }
    }

    /// Returns `true` for abnormal closure and going away.
    #[must_use]
    pub const fn is_unexpected(&self) -> bool {
        matches!(self, Disconnect::Unexpected { .. })
    }

    /// The close code, when one applies.
    #[must_use]
    pub const fn code(&self) -> Option<u16> {
        match self {
            Disconnect::Unexpected { code } => Some(*code),
            Disconnect::Normal { code } => *code,
            Disconnect::Failed(_) => None,
        }
    }
}

fn is_abrupt(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
    )
}

impl fmt::Display for Disconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disconnect::Unexpected { code } => write!(f, "unexpected closure ({})", code),
            Disconnect::Normal { code: Some(code) } => write!(f, "closed ({})", code),
            Disconnect::Normal { code: None } => write!(f, "closed"),
            Disconnect::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}
