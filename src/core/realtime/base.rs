//! Base types shared by the live streaming client and the transcription sidecar.
//!
//! This module defines the error taxonomy, the socket ready state, the close
//! event surfaced to subscribers, the structured log entry, and the timing
//! options that drive connect timeouts, reconnection and send retries.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during realtime operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RealtimeError {
    /// connect() was called without a session config, and none was stored
    #[error("No config available for connection")]
    ConfigMissing,

    /// The socket did not open before the connect timeout elapsed
    #[error("Connection timeout to \"{0}\"")]
    ConnectTimeout(String),

    /// The socket could not be opened or errored before the handshake
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The setup frame could not be serialized or written
    #[error("Failed to send setup message: {0}")]
    HandshakeFailed(String),

    /// A newer connect() replaced this attempt before it opened
    #[error("Connection attempt was superseded by a newer connection")]
    Superseded,

    /// No socket is tracked
    #[error("WebSocket is not connected")]
    NotConnected,

    /// A socket is tracked but is not open
    #[error("WebSocket is not open (state: {0})")]
    NotOpen(ReadyState),

    /// Writing a frame to the socket failed
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// A frame could not be encoded or decoded
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The sidecar could not open its dedicated connection
    #[error("STT client: failed to establish WebSocket connection after {attempts} attempts")]
    SidecarConnectExhausted {
        /// Number of connect attempts made
        attempts: u32,
    },
}

impl From<serde_json::Error> for RealtimeError {
    fn from(err: serde_json::Error) -> Self {
        RealtimeError::SerializationError(err.to_string())
    }
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Connection State
// =============================================================================

/// Ready state of the tracked socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyState {
    /// Opening, handshake not yet observed
    Connecting,
    /// Open and usable for transmission
    Open,
    /// Close requested, not yet confirmed
    Closing,
    /// Fully closed
    Closed,
}

impl ReadyState {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            ReadyState::Connecting => 0,
            ReadyState::Open => 1,
            ReadyState::Closing => 2,
            ReadyState::Closed => 3,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadyState::Connecting => write!(f, "connecting"),
            ReadyState::Open => write!(f, "open"),
            ReadyState::Closing => write!(f, "closing"),
            ReadyState::Closed => write!(f, "closed"),
        }
    }
}

// =============================================================================
// Close Event
// =============================================================================

/// Close code for a normal, intentional closure.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the socket ended without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

const ERROR_PRELUDE: &str = "ERROR]";

/// A socket close as observed by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseEvent {
    /// WebSocket close code
    pub code: u16,
    /// Raw close reason sent by the peer
    pub reason: String,
}

impl CloseEvent {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// A normal closure with no reason.
    pub fn normal() -> Self {
        Self::new(NORMAL_CLOSURE, "")
    }

    /// Whether this close was intentional and must not trigger reconnection.
    pub fn is_normal(&self) -> bool {
        self.code == NORMAL_CLOSURE
    }

    /// Reason suitable for showing to a user.
    ///
    /// Service errors arrive as `"... ERROR] message"`; only the text after the
    /// marker is returned for those.
    pub fn user_reason(&self) -> &str {
        match self.reason.find(ERROR_PRELUDE) {
            Some(index) => self.reason[index + ERROR_PRELUDE.len()..].trim_start(),
            None => self.reason.as_str(),
        }
    }
}

// =============================================================================
// Log Entry
// =============================================================================

/// Structured log entry emitted on the `log` signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamingLog {
    /// When the entry was produced
    pub timestamp: OffsetDateTime,
    /// Category, e.g. `client.send` or `server.audio`
    pub category: String,
    /// Human-readable detail
    pub message: String,
}

impl StreamingLog {
    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: OffsetDateTime::now_utc(),
            category: category.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Options
// =============================================================================

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default delay before reconnecting after an unexpected close.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Default delay before the single retry of a failed conversational send.
pub const DEFAULT_SEND_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Timing options for a [`LiveClient`](super::LiveClient).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// How long to wait for the socket to open
    pub connect_timeout: Duration,
    /// Delay before reconnecting after a non-normal close
    pub reconnect_delay: Duration,
    /// Delay before retrying a failed `send`
    pub send_retry_delay: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            send_retry_delay: DEFAULT_SEND_RETRY_DELAY,
        }
    }
}
