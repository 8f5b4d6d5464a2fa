//! Mock live endpoints
//!
//! Two flavours:
//! - `MockConnector`: in-memory sockets, driven step by step from the test
//!   (inject frames and closes, fail or stall opens, fail writes)
//! - `websocket_mock`: a real WebSocket server on localhost that speaks the
//!   live protocol, for exercising the tungstenite transport end to end

// Allow dead code in test infrastructure - not every test binary uses every helper
#![allow(dead_code)]

pub mod websocket_mock;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use waav_live::core::realtime::{
    CloseEvent, Connector, FrameSink, FrameSource, RealtimeError, RealtimeResult, Transport,
    TransportEvent,
};
use waav_live::core::signal::Signal;

/// What the next `open` does.
#[derive(Debug, Clone)]
pub enum OpenBehavior {
    /// Open immediately
    Accept,
    /// Open immediately, but every write fails
    AcceptFailingWrites,
    /// Open after a delay
    Delay(Duration),
    /// Fail with the given message
    Fail(String),
    /// Fail with the given message after a delay
    FailAfter(Duration, String),
    /// Never resolve
    Hang,
}

/// Server side of one in-memory socket.
#[derive(Clone)]
pub struct MockSocket {
    pub url: String,
    frames: Arc<Mutex<Vec<String>>>,
    close_sent: Arc<Mutex<Option<CloseEvent>>>,
    failing_writes: Arc<AtomicUsize>,
    inbound: mpsc::UnboundedSender<Option<TransportEvent>>,
}

impl MockSocket {
    /// Text frames the client wrote, in order.
    pub fn sent_frames(&self) -> Vec<String> {
        self.frames.lock().clone()
    }

    /// Written frames parsed as JSON.
    pub fn sent_json(&self) -> Vec<Value> {
        self.sent_frames()
            .iter()
            .map(|frame| serde_json::from_str(frame).expect("client wrote invalid JSON"))
            .collect()
    }

    /// Written frames whose top-level key is `kind` (`setup`, `clientContent`, ...).
    pub fn sent_of_kind(&self, kind: &str) -> Vec<Value> {
        self.sent_json()
            .into_iter()
            .filter(|frame| frame.get(kind).is_some())
            .collect()
    }

    /// Close frame written by the client, if any.
    pub fn close_sent(&self) -> Option<CloseEvent> {
        self.close_sent.lock().clone()
    }

    /// Make the next `count` writes fail.
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    pub fn push_json(&self, frame: Value) {
        self.push_bytes(frame.to_string().into_bytes());
    }

    pub fn push_bytes(&self, frame: impl Into<Bytes>) {
        let _ = self
            .inbound
            .send(Some(TransportEvent::Message(frame.into())));
    }

    pub fn push_error(&self, error: &str) {
        let _ = self
            .inbound
            .send(Some(TransportEvent::Error(error.to_string())));
    }

    /// Close from the server side with a close frame.
    pub fn push_close(&self, code: u16, reason: &str) {
        let _ = self
            .inbound
            .send(Some(TransportEvent::Closed(CloseEvent::new(code, reason))));
    }

    /// Drop the connection without a close frame.
    pub fn drop_connection(&self) {
        let _ = self.inbound.send(None);
    }
}

struct MockSink {
    frames: Arc<Mutex<Vec<String>>>,
    close_sent: Arc<Mutex<Option<CloseEvent>>>,
    failing_writes: Arc<AtomicUsize>,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send_text(&mut self, text: String) -> RealtimeResult<()> {
        let failing = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(RealtimeError::WebSocketError("mock write failure".into()));
        }
        self.frames.lock().push(text);
        Ok(())
    }

    async fn close(&mut self, code: u16, reason: &str) -> RealtimeResult<()> {
        *self.close_sent.lock() = Some(CloseEvent::new(code, reason));
        Ok(())
    }
}

struct MockSource {
    inbound: mpsc::UnboundedReceiver<Option<TransportEvent>>,
}

#[async_trait]
impl FrameSource for MockSource {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.inbound.recv().await.flatten()
    }
}

/// In-memory [`Connector`].
///
/// Opens follow the queued behaviours in order, then `Accept` (or the
/// configured fallback). Every accepted socket is recorded.
pub struct MockConnector {
    behaviors: Mutex<VecDeque<OpenBehavior>>,
    fallback: Mutex<OpenBehavior>,
    sockets: Mutex<Vec<MockSocket>>,
    open_attempts: AtomicU64,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Self::with_fallback(OpenBehavior::Accept)
    }

    /// Connector whose opens always behave as `fallback` unless queued otherwise.
    pub fn with_fallback(fallback: OpenBehavior) -> Arc<Self> {
        Arc::new(Self {
            behaviors: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            sockets: Mutex::new(Vec::new()),
            open_attempts: AtomicU64::new(0),
        })
    }

    pub fn push_behavior(&self, behavior: OpenBehavior) {
        self.behaviors.lock().push_back(behavior);
    }

    pub fn set_fallback(&self, behavior: OpenBehavior) {
        *self.fallback.lock() = behavior;
    }

    pub fn open_attempts(&self) -> u64 {
        self.open_attempts.load(Ordering::SeqCst)
    }

    pub fn socket_count(&self) -> usize {
        self.sockets.lock().len()
    }

    /// The `index`th accepted socket.
    pub fn socket(&self, index: usize) -> MockSocket {
        self.sockets.lock()[index].clone()
    }

    pub fn last_socket(&self) -> MockSocket {
        self.sockets
            .lock()
            .last()
            .cloned()
            .expect("no socket accepted yet")
    }

    fn accept(&self, url: &str, failing_writes: usize) -> Transport {
        let (tx, rx) = mpsc::unbounded_channel();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let close_sent = Arc::new(Mutex::new(None));
        let failing_writes = Arc::new(AtomicUsize::new(failing_writes));

        self.sockets.lock().push(MockSocket {
            url: url.to_string(),
            frames: frames.clone(),
            close_sent: close_sent.clone(),
            failing_writes: failing_writes.clone(),
            inbound: tx,
        });

        Transport {
            sink: Box::new(MockSink {
                frames,
                close_sent,
                failing_writes,
            }),
            source: Box::new(MockSource { inbound: rx }),
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, url: &str) -> RealtimeResult<Transport> {
        self.open_attempts.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .behaviors
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().clone());

        match behavior {
            OpenBehavior::Accept => Ok(self.accept(url, 0)),
            OpenBehavior::AcceptFailingWrites => Ok(self.accept(url, usize::MAX)),
            OpenBehavior::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(self.accept(url, 0))
            }
            OpenBehavior::Fail(message) => Err(RealtimeError::ConnectionFailed(message)),
            OpenBehavior::FailAfter(delay, message) => {
                tokio::time::sleep(delay).await;
                Err(RealtimeError::ConnectionFailed(message))
            }
            OpenBehavior::Hang => std::future::pending().await,
        }
    }
}

/// Let spawned client tasks (readers, closers, reconnects) run.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Count emissions of `signal`.
pub fn counter<T>(signal: &Signal<T>) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    signal.connect(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    count
}

/// Record every value emitted on `signal`.
pub fn record<T: Clone + Send + 'static>(signal: &Signal<T>) -> Arc<Mutex<Vec<T>>> {
    let values = Arc::new(Mutex::new(Vec::new()));
    let seen = values.clone();
    signal.connect(move |value: &T| seen.lock().push(value.clone()));
    values
}

// =============================================================================
// Frame builders
// =============================================================================

pub fn audio_part(pcm: &[u8]) -> Value {
    use base64::Engine;
    use base64::prelude::BASE64_STANDARD;
    json!({
        "inlineData": {
            "mimeType": "audio/pcm;rate=24000",
            "data": BASE64_STANDARD.encode(pcm),
        }
    })
}

pub fn text_part(text: &str) -> Value {
    json!({ "text": text })
}

pub fn model_turn(parts: Vec<Value>) -> Value {
    json!({ "serverContent": { "modelTurn": { "parts": parts } } })
}

pub fn turn_complete() -> Value {
    json!({ "serverContent": { "turnComplete": true } })
}

pub fn setup_complete() -> Value {
    json!({ "setupComplete": {} })
}
