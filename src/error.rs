//! Error taxonomy for the session engine.
//!
//! Per-call failures (`CallError`) never tear the connection down; link-level
//! failures surface through `ConnectError` or the disconnect callback. A kick
//! is not an error at all: it arrives as a [`DisconnectReason`].

use std::fmt;
use std::time::Duration;

use crate::connection::ConnectionState;

/// Socket-level failure while opening, writing, or reading the link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("websocket connect failed: {0}")]
    Connect(Box<tokio_tungstenite::tungstenite::Error>),
    /// The gateway answered the upgrade with a non-101 HTTP status.
    #[error("websocket handshake rejected with HTTP {status}")]
    Rejected { status: u16 },
    #[error("invalid gateway request: {0}")]
    InvalidRequest(String),
    #[error("websocket send failed: {0}")]
    Send(String),
    #[error("websocket closed")]
    Closed,
}

impl TransportError {
    /// Handshake rejections in the 4xx range mean the credential was refused.
    #[must_use]
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::Rejected { status } if (400..500).contains(status))
    }
}

/// Failure of a single RPC call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// No reply arrived before the deadline; the pending entry was discarded.
    #[error("{route} timed out after {timeout_ms}ms (seq={seq})")]
    Timeout { route: String, seq: u64, timeout_ms: u64 },
    /// The reply carried a non-zero error code.
    #[error("{route} failed: code={code} {message}")]
    Rpc { route: String, code: i64, message: String },
    /// The link went away while the call was outstanding.
    #[error("connection closed")]
    ConnectionClosed,
    /// The call was issued while the client was not online.
    #[error("client is not online (state: {0})")]
    NotOnline(ConnectionState),
    /// The reply body did not decode as the expected message.
    #[error("failed to decode {route} reply: {message}")]
    Decode { route: String, message: String },
}

/// Failure of [`Client::connect`](crate::Client::connect).
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// The login reply (or the websocket handshake) rejected the credential.
    #[error("login rejected: code={code} {message}")]
    Auth { code: i64, message: String },
    #[error("login timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connection(#[from] TransportError),
    #[error("client already active (state: {0})")]
    AlreadyActive(ConnectionState),
    #[error("login reply could not be decoded: {0}")]
    InvalidReply(#[from] prost::DecodeError),
}

/// Invalid configuration value.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown platform {0:?} (expected 'qq' or 'wx')")]
    UnknownPlatform(String),
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Why a link ended without the owner asking for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The server forced a logout; carries its human-readable reason.
    Kicked(String),
    /// Consecutive heartbeat failures reached the limit.
    HeartbeatLost { misses: u32 },
    /// Automatic reconnection used up its attempt budget.
    ReconnectExhausted { attempts: u32, last_error: String },
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kicked(reason) => f.write_str(reason),
            Self::HeartbeatLost { misses } => write!(f, "heartbeat lost after {misses} misses"),
            Self::ReconnectExhausted { attempts, last_error } => {
                write!(f, "reconnect failed after {attempts} attempts: {last_error}")
            }
        }
    }
}
