//! Live streaming client.
//!
//! [`LiveClient`] owns at most one socket to the live endpoint. It performs the
//! `setup` handshake, turns inbound frames into typed signals, reconnects after
//! unexpected closes, and multiplexes the outbound frame kinds over the one
//! socket.
//!
//! # Socket identity
//!
//! Every socket gets a [`SocketId`] when it is created. The client tracks one
//! "current" socket; late events from a socket that has been replaced (its
//! close, its frames) are recognised by id and ignored. At most one reconnect
//! is pending per client at any time.
//!
//! # Example
//!
//! ```rust,ignore
//! use waav_live::core::realtime::{LiveClient, LiveConfig, Part};
//!
//! let client = LiveClient::new("wss://example.com/live?key=...");
//! client.signals().modeltext.connect(|text| println!("{text}"));
//! client.connect(Some(LiveConfig::new("models/gemini-2.0-flash-exp"))).await?;
//! client.send(vec![Part::text("Hello")], true).await?;
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use super::base::{
    ClientOptions, CloseEvent, NORMAL_CLOSURE, ReadyState, RealtimeError, RealtimeResult,
    StreamingLog,
};
use super::classifier::{LiveEvent, classify_message};
use super::messages::{
    Blob, LiveConfig, LiveIncomingMessage, LiveOutgoingMessage, ModelTurn, Part, ToolCall,
    ToolCallCancellation, ToolResponse,
};
use super::transport::{
    Connector, FrameSink, FrameSource, Transport, TransportEvent, WebSocketConnector,
    abnormal_close,
};
use crate::config::{ClientConfig, ConfigError};
use crate::core::signal::Signal;
use crate::utils::url_validation::redact_key;

// =============================================================================
// Signals
// =============================================================================

/// Every signal a [`LiveClient`] emits.
///
/// All signals are emitted synchronously from the task that observed the
/// triggering event. Signals derived from one inbound frame are all emitted
/// before the next frame is read.
#[derive(Debug)]
pub struct LiveSignals {
    /// Socket opened (the handshake has already been written)
    pub open: Signal<()>,
    /// Structured log entries
    pub log: Signal<StreamingLog>,
    /// Current socket closed
    pub close: Signal<CloseEvent>,
    /// Decoded PCM audio from the model
    pub audio: Signal<Bytes>,
    /// Non-audio parts of a model turn
    pub content: Signal<ModelTurn>,
    pub interrupted: Signal<()>,
    pub setupcomplete: Signal<()>,
    pub turncomplete: Signal<()>,
    pub toolcall: Signal<ToolCall>,
    pub toolcallcancellation: Signal<ToolCallCancellation>,
    /// Model text judged to be an assistant utterance
    pub modeltext: Signal<String>,
    /// Model text judged to be a transcription
    pub transcription: Signal<String>,
}

impl Default for LiveSignals {
    fn default() -> Self {
        Self {
            open: Signal::new("open"),
            log: Signal::new("log"),
            close: Signal::new("close"),
            audio: Signal::new("audio"),
            content: Signal::new("content"),
            interrupted: Signal::new("interrupted"),
            setupcomplete: Signal::new("setupcomplete"),
            turncomplete: Signal::new("turncomplete"),
            toolcall: Signal::new("toolcall"),
            toolcallcancellation: Signal::new("toolcallcancellation"),
            modeltext: Signal::new("modeltext"),
            transcription: Signal::new("transcription"),
        }
    }
}

// =============================================================================
// Socket tracking
// =============================================================================

/// Identity of one socket opened by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketId(u64);

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type SharedSink = Arc<tokio::sync::Mutex<Option<Box<dyn FrameSink>>>>;

struct SocketHandle {
    id: SocketId,
    state: Arc<AtomicU8>,
    /// Empty until the socket opens, and again once it is closed
    sink: SharedSink,
}

impl SocketHandle {
    fn new(id: SocketId) -> Self {
        Self {
            id,
            state: Arc::new(AtomicU8::new(ReadyState::Connecting.as_u8())),
            sink: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::SeqCst))
    }
}

struct ClientInner {
    url: String,
    /// `url` with the key masked
    display_url: String,
    connector: Arc<dyn Connector>,
    options: ClientOptions,
    config: RwLock<Option<LiveConfig>>,
    socket: Mutex<Option<SocketHandle>>,
    next_socket_id: AtomicU64,
    reconnect: Mutex<Option<JoinHandle<()>>>,
    signals: LiveSignals,
}

// =============================================================================
// Live Client
// =============================================================================

/// Client for the bidirectional live endpoint.
///
/// Cheap to clone; clones share the same socket, config and signals.
#[derive(Clone)]
pub struct LiveClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for LiveClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveClient")
            .field("url", &self.inner.display_url)
            .field("ready_state", &self.ready_state())
            .finish()
    }
}

impl LiveClient {
    /// Client for `url` (which already carries the key) over WebSocket, with
    /// default timings.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_connector(url, Arc::new(WebSocketConnector), ClientOptions::default())
    }

    /// Client for the endpoint, primary key and timings in `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_connector(
            config.live_url()?,
            Arc::new(WebSocketConnector),
            config.client_options(),
        ))
    }

    /// Client using a custom connector and timings.
    pub fn with_connector(
        url: impl Into<String>,
        connector: Arc<dyn Connector>,
        options: ClientOptions,
    ) -> Self {
        let url = url.into();
        let display_url = redact_key(&url);
        Self {
            inner: Arc::new(ClientInner {
                url,
                display_url,
                connector,
                options,
                config: RwLock::new(None),
                socket: Mutex::new(None),
                next_socket_id: AtomicU64::new(1),
                reconnect: Mutex::new(None),
                signals: LiveSignals::default(),
            }),
        }
    }

    pub fn signals(&self) -> &LiveSignals {
        &self.inner.signals
    }

    /// Target URL, including the key.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn options(&self) -> ClientOptions {
        self.inner.options
    }

    /// The stored session config, if any.
    pub fn config(&self) -> Option<LiveConfig> {
        self.inner.config.read().clone()
    }

    /// State of the tracked socket, or `None` when no socket is tracked.
    pub fn ready_state(&self) -> Option<ReadyState> {
        self.inner.socket.lock().as_ref().map(SocketHandle::ready_state)
    }

    pub fn is_open(&self) -> bool {
        self.ready_state() == Some(ReadyState::Open)
    }

    /// Id of the tracked socket.
    pub fn current_socket(&self) -> Option<SocketId> {
        self.inner.socket.lock().as_ref().map(|handle| handle.id)
    }

    /// Whether a reconnect is scheduled and has not started yet.
    pub fn reconnect_pending(&self) -> bool {
        self.inner
            .reconnect
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn is_current(&self, id: SocketId) -> bool {
        self.current_socket() == Some(id)
    }

    fn log(&self, category: &str, message: impl Into<String>) {
        let entry = StreamingLog::new(category, message);
        tracing::trace!(category = %entry.category, "{}", entry.message);
        self.inner.signals.log.emit(&entry);
    }

    // =========================================================================
    // Connection management
    // =========================================================================

    /// Open a socket and send the `setup` handshake.
    ///
    /// `config` replaces the stored session config; `None` reuses it. Any
    /// tracked socket is closed first, so at most one socket is live. Resolves
    /// once the handshake frame has been written.
    pub async fn connect(&self, config: Option<LiveConfig>) -> RealtimeResult<()> {
        let config = match config {
            Some(config) => {
                *self.inner.config.write() = Some(config.clone());
                config
            }
            None => self
                .inner
                .config
                .read()
                .clone()
                .ok_or(RealtimeError::ConfigMissing)?,
        };

        self.disconnect(None);

        let id = SocketId(self.inner.next_socket_id.fetch_add(1, Ordering::SeqCst));
        let handle = SocketHandle::new(id);
        let state = handle.state.clone();
        let sink_slot = handle.sink.clone();
        *self.inner.socket.lock() = Some(handle);

        tracing::info!("Connecting socket {} to {}", id, self.inner.display_url);

        let opened = tokio::time::timeout(
            self.inner.options.connect_timeout,
            self.inner.connector.open(&self.inner.url),
        )
        .await;

        let Transport { sink, source } = match opened {
            Ok(Ok(transport)) => transport,
            Ok(Err(e)) => {
                if !self.disconnect(Some(id)) {
                    tracing::debug!("Socket {} superseded before it failed: {}", id, e);
                    return Err(RealtimeError::Superseded);
                }
                tracing::error!("Socket {} failed to open: {}", id, e);
                self.log(
                    "server.error",
                    format!("Could not connect to \"{}\": {}", self.inner.display_url, e),
                );
                return Err(match e {
                    RealtimeError::ConnectionFailed(_) | RealtimeError::InvalidConfiguration(_) => e,
                    other => RealtimeError::ConnectionFailed(other.to_string()),
                });
            }
            Err(_) => {
                if !self.disconnect(Some(id)) {
                    tracing::debug!("Socket {} superseded before it timed out", id);
                    return Err(RealtimeError::Superseded);
                }
                tracing::warn!(
                    "Socket {} did not open within {:?}",
                    id,
                    self.inner.options.connect_timeout
                );
                self.log("server.timeout", "Connection timeout");
                return Err(RealtimeError::ConnectTimeout(self.inner.display_url.clone()));
            }
        };

        // Setup is written while the socket is still Connecting, under the sink
        // lock, so it is always the first frame on the wire.
        let mut slot = sink_slot.lock().await;
        let mut sink = sink;
        if ReadyState::from_u8(state.load(Ordering::SeqCst)) != ReadyState::Connecting {
            let _ = sink.close(NORMAL_CLOSURE, "").await;
            tracing::debug!("Socket {} superseded before it opened", id);
            return Err(RealtimeError::Superseded);
        }

        let handshake = match LiveOutgoingMessage::Setup(config).to_json() {
            Ok(json) => sink.send_text(json).await,
            Err(e) => Err(e),
        };
        if let Err(e) = handshake {
            tracing::error!("Failed to send setup on socket {}: {}", id, e);
            let _ = sink.close(NORMAL_CLOSURE, "").await;
            drop(slot);
            self.disconnect(Some(id));
            return Err(RealtimeError::HandshakeFailed(e.to_string()));
        }

        *slot = Some(sink);
        if state
            .compare_exchange(
                ReadyState::Connecting.as_u8(),
                ReadyState::Open.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            if let Some(mut sink) = slot.take() {
                let _ = sink.close(NORMAL_CLOSURE, "").await;
            }
            tracing::debug!("Socket {} superseded during the handshake", id);
            return Err(RealtimeError::Superseded);
        }
        drop(slot);

        tracing::info!("Socket {} open", id);
        self.inner.signals.open.emit(&());
        self.log("client.open", "Connected");
        self.log("client.send", "setup");

        // The close handler lives in the reader, so it only exists once the
        // handshake went out.
        tokio::spawn(run_reader(Arc::downgrade(&self.inner), id, source));

        Ok(())
    }

    /// Close the tracked socket.
    ///
    /// With `Some(target)`, only closes if `target` is still the tracked
    /// socket. `None` also cancels a pending reconnect. Returns whether a
    /// socket was closed; calling it again is a no-op.
    ///
    /// The close frame is written from a spawned task. Outside a Tokio
    /// runtime the socket is dropped without a close frame instead.
    pub fn disconnect(&self, target: Option<SocketId>) -> bool {
        if target.is_none()
            && let Some(pending) = self.inner.reconnect.lock().take()
        {
            pending.abort();
        }

        let Some(handle) = self.take_socket(target) else {
            return false;
        };

        let was_open = handle.ready_state() == ReadyState::Open;
        handle
            .state
            .store(ReadyState::Closing.as_u8(), Ordering::SeqCst);

        let state = handle.state.clone();
        let sink = handle.sink.clone();
        let id = handle.id;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Some(mut sink) = sink.lock().await.take()
                        && let Err(e) = sink.close(NORMAL_CLOSURE, "").await
                    {
                        tracing::debug!("Socket {} close failed: {}", id, e);
                    }
                    state.store(ReadyState::Closed.as_u8(), Ordering::SeqCst);
                });
            }
            Err(_) => {
                tracing::debug!("No runtime to close socket {} on, dropping it", id);
                if let Ok(mut slot) = sink.try_lock() {
                    slot.take();
                }
                state.store(ReadyState::Closed.as_u8(), Ordering::SeqCst);
            }
        }

        tracing::info!("Disconnected socket {}", id);
        self.log("client.close", "Disconnected");
        if was_open {
            self.inner.signals.close.emit(&CloseEvent::normal());
        }
        true
    }

    fn take_socket(&self, target: Option<SocketId>) -> Option<SocketHandle> {
        let mut socket = self.inner.socket.lock();
        match (socket.as_ref(), target) {
            (Some(handle), Some(target)) if handle.id != target => None,
            _ => socket.take(),
        }
    }

    fn handle_close(&self, id: SocketId, close: CloseEvent) {
        let Some(handle) = self.take_socket(Some(id)) else {
            tracing::debug!("Ignoring close of stale socket {} ({})", id, close.code);
            return;
        };
        handle
            .state
            .store(ReadyState::Closed.as_u8(), Ordering::SeqCst);

        let reason = close.user_reason();
        let message = if reason.is_empty() {
            format!("disconnected ({})", close.code)
        } else {
            format!("disconnected: {} ({})", reason, close.code)
        };
        self.log("server.close", message);

        if close.is_normal() {
            tracing::info!("Socket {} closed normally", id);
        } else {
            tracing::warn!("Socket {} closed unexpectedly: {} {}", id, close.code, reason);
        }

        self.inner.signals.close.emit(&close);

        if !close.is_normal() {
            self.schedule_reconnect(self.inner.options.reconnect_delay);
        }
    }

    /// Reconnect with the stored config after `delay`, unless a reconnect is
    /// already pending.
    fn schedule_reconnect(&self, delay: Duration) {
        let mut pending = self.inner.reconnect.lock();
        if pending.as_ref().is_some_and(|handle| !handle.is_finished()) {
            tracing::debug!("Reconnect already pending");
            return;
        }

        tracing::info!("Reconnecting in {:?}", delay);
        let inner = Arc::downgrade(&self.inner);
        // The task clears the slot under the same lock, so it cannot run ahead
        // of this assignment.
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            inner.reconnect.lock().take();

            let client = LiveClient { inner };
            if let Err(e) = client.connect(None).await {
                tracing::warn!("Reconnect failed: {}", e);
            }
        }));
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    fn handle_frame(&self, frame: &[u8]) {
        let message = match LiveIncomingMessage::decode(frame) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Dropping undecodable frame: {}", e);
                self.log("server.unmatched", format!("undecodable frame: {}", e));
                return;
            }
        };

        for event in classify_message(message) {
            self.dispatch(event);
        }
    }

    fn dispatch(&self, event: LiveEvent) {
        let signals = &self.inner.signals;
        match event {
            LiveEvent::ToolCall(call) => {
                self.log("server.toolCall", summarize(&call));
                signals.toolcall.emit(&call);
            }
            LiveEvent::ToolCallCancellation(cancellation) => {
                self.log("server.toolCallCancellation", summarize(&cancellation));
                signals.toolcallcancellation.emit(&cancellation);
            }
            LiveEvent::SetupComplete => {
                self.log("server.setupComplete", "setup complete");
                signals.setupcomplete.emit(&());
            }
            LiveEvent::Interrupted => {
                self.log("server.interrupted", "interrupted");
                signals.interrupted.emit(&());
            }
            LiveEvent::TurnComplete => {
                self.log("server.turnComplete", "turnComplete");
                signals.turncomplete.emit(&());
            }
            LiveEvent::Audio(data) => {
                self.log("server.audio", format!("buffer ({} bytes)", data.len()));
                signals.audio.emit(&data);
            }
            LiveEvent::Transcription(text) => {
                self.log("server.transcription", text.as_str());
                signals.transcription.emit(&text);
            }
            LiveEvent::ModelText(text) => {
                self.log("server.modeltext", text.as_str());
                signals.modeltext.emit(&text);
            }
            LiveEvent::Content(turn) => {
                self.log("server.content", summarize(&turn));
                signals.content.emit(&turn);
            }
            LiveEvent::Unmatched(value) => {
                tracing::debug!("Unmatched frame: {}", value);
                self.log("server.unmatched", value.to_string());
            }
        }
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    /// Send one user turn.
    ///
    /// A failed write is retried once after the send retry delay, and only if
    /// the socket is open by then.
    pub async fn send(&self, parts: Vec<Part>, turn_complete: bool) -> RealtimeResult<()> {
        let part_count = parts.len();
        let message = LiveOutgoingMessage::user_turn(parts, turn_complete);

        if let Err(e) = self.transmit(&message).await {
            let delay = self.inner.options.send_retry_delay;
            tracing::warn!("Send failed, retrying in {:?}: {}", delay, e);
            tokio::time::sleep(delay).await;

            if !self.is_open() {
                tracing::warn!("Socket not open at retry time, giving up");
                return Err(e);
            }
            self.log("client.send.retry", format!("retrying after: {}", e));
            self.transmit(&message).await?;
        }

        self.log(
            "client.send",
            format!("{} part(s), turnComplete={}", part_count, turn_complete),
        );
        Ok(())
    }

    /// Send one batch of media chunks.
    ///
    /// Dropped, not queued, when the socket is not open.
    pub async fn send_realtime_input(&self, chunks: Vec<Blob>) -> RealtimeResult<()> {
        let kind = media_kind(&chunks);
        let message = LiveOutgoingMessage::realtime_input(chunks);

        match self.transmit(&message).await {
            Ok(()) => {
                self.log("client.realtimeInput", kind);
                Ok(())
            }
            Err(e) => {
                tracing::debug!("Dropped realtime input ({}): {}", kind, e);
                Err(e)
            }
        }
    }

    /// Send tool results.
    pub async fn send_tool_response(&self, response: ToolResponse) -> RealtimeResult<()> {
        let summary = summarize(&response);
        self.transmit(&LiveOutgoingMessage::ToolResponse(response))
            .await?;
        self.log("client.toolResponse", summary);
        Ok(())
    }

    /// Write one frame to the current socket.
    ///
    /// Fails fast when there is no socket (and starts a connect) or when the
    /// socket is not open (and reconnects only if it is fully closed).
    pub async fn transmit(&self, message: &LiveOutgoingMessage) -> RealtimeResult<()> {
        let (state, sink) = match self.inner.socket.lock().as_ref() {
            Some(handle) => (handle.ready_state(), handle.sink.clone()),
            None => {
                tracing::debug!("No socket, connecting");
                self.schedule_reconnect(Duration::ZERO);
                return Err(RealtimeError::NotConnected);
            }
        };

        if state != ReadyState::Open {
            if state == ReadyState::Closed {
                self.schedule_reconnect(Duration::ZERO);
            }
            return Err(RealtimeError::NotOpen(state));
        }

        Self::write_frame(&sink, message).await
    }

    async fn write_frame(sink: &SharedSink, message: &LiveOutgoingMessage) -> RealtimeResult<()> {
        let json = message.to_json()?;
        let mut guard = sink.lock().await;
        let sink = guard
            .as_mut()
            .ok_or(RealtimeError::NotOpen(ReadyState::Closing))?;
        sink.send_text(json).await
    }
}

async fn run_reader(inner: Weak<ClientInner>, id: SocketId, mut source: Box<dyn FrameSource>) {
    loop {
        let event = source.next_event().await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let client = LiveClient { inner };

        match event {
            Some(TransportEvent::Message(frame)) => {
                if client.is_current(id) {
                    client.handle_frame(&frame);
                } else {
                    tracing::debug!("Ignoring frame from stale socket {}", id);
                }
            }
            Some(TransportEvent::Error(e)) => {
                tracing::warn!("Socket {} error: {}", id, e);
                client.log("server.error", e);
            }
            Some(TransportEvent::Closed(close)) => {
                client.handle_close(id, close);
                return;
            }
            None => {
                client.handle_close(id, abnormal_close());
                return;
            }
        }
    }
}

/// `audio`, `video`, `audio + video` or `unknown` for a chunk batch.
fn media_kind(chunks: &[Blob]) -> &'static str {
    let has_audio = chunks.iter().any(|c| c.mime_type.contains("audio"));
    let has_video = chunks.iter().any(|c| c.mime_type.contains("image"));
    match (has_audio, has_video) {
        (true, true) => "audio + video",
        (true, false) => "audio",
        (false, true) => "video",
        (false, false) => "unknown",
    }
}

fn summarize<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind() {
        let audio = Blob::from_bytes("audio/pcm;rate=16000", &[0]);
        let image = Blob::from_bytes("image/jpeg", &[0]);
        let other = Blob::from_bytes("text/plain", &[0]);

        assert_eq!(media_kind(std::slice::from_ref(&audio)), "audio");
        assert_eq!(media_kind(std::slice::from_ref(&image)), "video");
        assert_eq!(media_kind(&[audio, image]), "audio + video");
        assert_eq!(media_kind(&[other]), "unknown");
        assert_eq!(media_kind(&[]), "unknown");
    }

    #[test]
    fn test_socket_id_display() {
        assert_eq!(SocketId(7).to_string(), "#7");
    }

    #[test]
    fn test_signal_names() {
        let signals = LiveSignals::default();
        assert_eq!(signals.toolcallcancellation.name(), "toolcallcancellation");
        assert_eq!(signals.setupcomplete.name(), "setupcomplete");
    }

    #[tokio::test]
    async fn test_connect_without_config_fails_fast() {
        let client = LiveClient::new("wss://example.com/live?key=k");
        let result = client.connect(None).await;

        assert!(matches!(result, Err(RealtimeError::ConfigMissing)));
        assert_eq!(client.ready_state(), None);
    }

    #[tokio::test]
    async fn test_disconnect_without_socket_is_noop() {
        let client = LiveClient::new("wss://example.com/live?key=k");
        assert!(!client.disconnect(None));
        assert!(!client.disconnect(Some(SocketId(1))));
    }

    #[test]
    fn test_debug_masks_key() {
        let client = LiveClient::new("wss://example.com/live?key=secret");
        let debug = format!("{:?}", client);
        assert!(!debug.contains("secret"));
        assert_eq!(client.url(), "wss://example.com/live?key=secret");
    }
}
