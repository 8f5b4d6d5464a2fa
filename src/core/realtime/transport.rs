//! Socket seam between the client and the network.
//!
//! A [`Connector`] opens one bidirectional socket and hands back its two
//! halves. The client only ever talks to these traits, so the WebSocket
//! implementation below can be swapped for an in-memory one in tests.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::base::{ABNORMAL_CLOSURE, CloseEvent, RealtimeError, RealtimeResult};

/// Close code reported when the peer sent a close frame without a status.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// Something observed on the read half of a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One complete frame payload
    Message(Bytes),
    /// A non-fatal read error; a close usually follows
    Error(String),
    /// The socket closed
    Closed(CloseEvent),
}

/// Write half of a socket.
#[async_trait]
pub trait FrameSink: Send {
    /// Write one text frame.
    async fn send_text(&mut self, text: String) -> RealtimeResult<()>;

    /// Send a close frame and shut the write half.
    async fn close(&mut self, code: u16, reason: &str) -> RealtimeResult<()>;
}

/// Read half of a socket.
#[async_trait]
pub trait FrameSource: Send {
    /// Next event, or `None` once the socket is gone.
    async fn next_event(&mut self) -> Option<TransportEvent>;
}

/// An opened socket, split into halves.
pub struct Transport {
    pub sink: Box<dyn FrameSink>,
    pub source: Box<dyn FrameSource>,
}

/// Opens sockets.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a socket to `url`. Resolves once the socket is open.
    async fn open(&self, url: &str) -> RealtimeResult<Transport>;
}

// =============================================================================
// WebSocket implementation
// =============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`Connector`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, url: &str) -> RealtimeResult<Transport> {
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| match e {
                WsError::Url(e) => RealtimeError::InvalidConfiguration(format!("invalid URL: {e}")),
                e => RealtimeError::ConnectionFailed(e.to_string()),
            })?;

        let (sink, stream) = ws_stream.split();

        Ok(Transport {
            sink: Box::new(WebSocketSink { sink }),
            source: Box::new(WebSocketSource {
                stream,
                failed: false,
            }),
        })
    }
}

struct WebSocketSink {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send_text(&mut self, text: String) -> RealtimeResult<()> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| RealtimeError::WebSocketError(e.to_string()))
    }

    async fn close(&mut self, code: u16, reason: &str) -> RealtimeResult<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        self.sink
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| RealtimeError::WebSocketError(e.to_string()))?;
        self.sink
            .close()
            .await
            .map_err(|e| RealtimeError::WebSocketError(e.to_string()))
    }
}

struct WebSocketSource {
    stream: SplitStream<WsStream>,
    failed: bool,
}

#[async_trait]
impl FrameSource for WebSocketSource {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        if self.failed {
            return None;
        }

        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => {
                    self.failed = true;
                    return Some(TransportEvent::Error(e.to_string()));
                }
            };

            // The service sends JSON in binary frames as often as in text frames.
            match message {
                Message::Text(text) => {
                    return Some(TransportEvent::Message(Bytes::copy_from_slice(
                        text.as_bytes(),
                    )));
                }
                Message::Binary(data) => return Some(TransportEvent::Message(data)),
                Message::Close(frame) => {
                    let close = match frame {
                        Some(frame) => CloseEvent::new(u16::from(frame.code), frame.reason.as_str()),
                        None => CloseEvent::new(NO_STATUS_RECEIVED, ""),
                    };
                    return Some(TransportEvent::Closed(close));
                }
                // tungstenite queues the pong itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }
}

/// Close event for a source that ended without a close frame.
pub(crate) fn abnormal_close() -> CloseEvent {
    CloseEvent::new(ABNORMAL_CLOSURE, "")
}
