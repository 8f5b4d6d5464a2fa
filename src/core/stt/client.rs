//! Transcription sidecar client.
//!
//! [`SttClient`] buffers audio (typically the primary channel's model audio)
//! and periodically submits it for transcription over a dedicated
//! [`LiveClient`] with its own key. Transcription traffic never touches the
//! conversational socket.
//!
//! Flushes are triggered by the periodic timer (`start()`) and, once attached
//! to a primary client, by its `turncomplete` and `interrupted` signals. At
//! most one flush runs at a time; a flush requested while one is in flight is
//! dropped and the audio waits for the next trigger.

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::config::{
    STT_AUDIO_MIME_TYPE, SttOptions, TRANSCRIBE_INSTRUCTION, transcription_session_config,
};
use crate::config::{ClientConfig, ConfigError};
use crate::core::realtime::{
    Blob, ClientOptions, Connector, LiveClient, Part, RealtimeError, RealtimeResult,
    WebSocketConnector, is_likely_transcription,
};
use crate::core::signal::{ListenerId, Signal};

/// Signals emitted by the sidecar.
#[derive(Debug)]
pub struct SttSignals {
    /// Text judged to be a transcription
    pub transcription: Signal<String>,
    /// Failed flushes
    pub error: Signal<RealtimeError>,
}

impl Default for SttSignals {
    fn default() -> Self {
        Self {
            transcription: Signal::new("transcription"),
            error: Signal::new("error"),
        }
    }
}

/// Result of one [`SttClient::process_audio_buffer`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Another flush was running
    InFlight,
    /// Nothing buffered
    Empty,
    /// Audio submitted
    Sent { bytes: usize },
}

/// Listener handles installed on a primary client by [`SttClient::attach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SttAttachment {
    audio: ListenerId,
    turncomplete: ListenerId,
    interrupted: ListenerId,
}

struct SttInner {
    client: LiveClient,
    options: SttOptions,
    buffer: Mutex<Vec<Bytes>>,
    processing: AtomicBool,
    interval: Mutex<Option<JoinHandle<()>>>,
    signals: SttSignals,
}

impl SttInner {
    fn add_audio(&self, chunk: Bytes) {
        self.buffer.lock().push(chunk);
    }

    fn surface(&self, text: &str) {
        if is_likely_transcription(text) {
            self.signals.transcription.emit(&text.to_string());
        } else {
            tracing::debug!("STT channel returned non-transcription text, discarding");
        }
    }
}

/// Clears the in-flight flag when the flush ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Transcription sidecar.
///
/// Cheap to clone; clones share the buffer and the dedicated connection.
#[derive(Clone)]
pub struct SttClient {
    inner: Arc<SttInner>,
}

impl std::fmt::Debug for SttClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SttClient")
            .field("client", &self.inner.client)
            .field("buffered_chunks", &self.inner.buffer.lock().len())
            .field("processing", &self.is_processing())
            .finish()
    }
}

impl SttClient {
    /// Sidecar over WebSocket to `url` (which carries the STT key).
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_connector(
            url,
            Arc::new(WebSocketConnector),
            ClientOptions::default(),
            SttOptions::default(),
        )
    }

    /// Sidecar for the endpoint and STT key in `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_connector(
            config.stt_url()?,
            Arc::new(WebSocketConnector),
            config.client_options(),
            config.stt_options(),
        ))
    }

    pub fn with_connector(
        url: impl Into<String>,
        connector: Arc<dyn Connector>,
        client_options: ClientOptions,
        options: SttOptions,
    ) -> Self {
        let client = LiveClient::with_connector(url, connector, client_options);
        let inner = Arc::new(SttInner {
            client,
            options,
            buffer: Mutex::new(Vec::new()),
            processing: AtomicBool::new(false),
            interval: Mutex::new(None),
            signals: SttSignals::default(),
        });

        // Re-check whatever text comes back, whichever way it was classified.
        let signals = inner.client.signals();
        let weak = Arc::downgrade(&inner);
        signals.transcription.connect(move |text: &String| {
            if let Some(inner) = weak.upgrade() {
                inner.surface(text);
            }
        });
        let weak = Arc::downgrade(&inner);
        signals.modeltext.connect(move |text: &String| {
            if let Some(inner) = weak.upgrade() {
                inner.surface(text);
            }
        });

        Self { inner }
    }

    pub fn signals(&self) -> &SttSignals {
        &self.inner.signals
    }

    /// The dedicated connection.
    pub fn client(&self) -> &LiveClient {
        &self.inner.client
    }

    pub fn options(&self) -> SttOptions {
        self.inner.options
    }

    /// Append a chunk to the buffer.
    pub fn add_audio(&self, chunk: impl Into<Bytes>) {
        self.inner.add_audio(chunk.into());
    }

    /// Total bytes waiting for the next flush.
    pub fn buffered_bytes(&self) -> usize {
        self.inner.buffer.lock().iter().map(Bytes::len).sum()
    }

    pub fn is_processing(&self) -> bool {
        self.inner.processing.load(Ordering::SeqCst)
    }

    /// Drain the buffer and submit it for transcription.
    ///
    /// No-op when a flush is already running or nothing is buffered. The
    /// drained audio is discarded if the dedicated connection cannot be opened;
    /// it is never put back.
    pub async fn process_audio_buffer(&self) -> RealtimeResult<FlushOutcome> {
        let Some(_in_flight) = InFlight::acquire(&self.inner.processing) else {
            tracing::debug!("STT flush already in flight, skipping");
            return Ok(FlushOutcome::InFlight);
        };

        let chunks = mem::take(&mut *self.inner.buffer.lock());
        if chunks.is_empty() {
            return Ok(FlushOutcome::Empty);
        }

        let mut audio = Vec::with_capacity(chunks.iter().map(Bytes::len).sum());
        for chunk in &chunks {
            audio.extend_from_slice(chunk);
        }
        let bytes = audio.len();
        let blob = Blob::from_bytes(STT_AUDIO_MIME_TYPE, &audio);

        if let Err(e) = self.ensure_connected().await {
            tracing::error!("STT flush failed, discarding {} bytes: {}", bytes, e);
            self.inner.signals.error.emit(&e);
            return Err(e);
        }

        let parts = vec![Part::inline_data(blob), Part::text(TRANSCRIBE_INSTRUCTION)];
        if let Err(e) = self.inner.client.send(parts, true).await {
            tracing::error!("STT flush send failed: {}", e);
            self.inner.signals.error.emit(&e);
            return Err(e);
        }

        tracing::info!("Sent {} bytes of audio for transcription", bytes);
        Ok(FlushOutcome::Sent { bytes })
    }

    /// Flush, then wait up to `wait` for the next transcription.
    ///
    /// Returns `None` when nothing was sent or no transcription arrived in
    /// time. Used before [`dispose`](Self::dispose) so the reply to a final
    /// flush is not lost with the connection.
    pub async fn flush_and_wait(&self, wait: Duration) -> RealtimeResult<Option<String>> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener = self
            .inner
            .signals
            .transcription
            .connect(move |text: &String| {
                let _ = tx.send(text.clone());
            });

        let text = match self.process_audio_buffer().await {
            Ok(FlushOutcome::Sent { .. }) => tokio::time::timeout(wait, rx.recv())
                .await
                .ok()
                .flatten(),
            Ok(_) => None,
            Err(e) => {
                self.inner.signals.transcription.disconnect(listener);
                return Err(e);
            }
        };

        self.inner.signals.transcription.disconnect(listener);
        if text.is_none() {
            tracing::debug!("No transcription within {:?} of the final flush", wait);
        }
        Ok(text)
    }

    async fn ensure_connected(&self) -> RealtimeResult<()> {
        let client = &self.inner.client;
        if client.is_open() {
            return Ok(());
        }

        let attempts = self.inner.options.connect_attempts;
        for attempt in 1..=attempts {
            tracing::debug!(
                "STT socket not open (state: {:?}), attempt {}/{}",
                client.ready_state(),
                attempt,
                attempts
            );

            match client.connect(Some(transcription_session_config())).await {
                Ok(()) if client.is_open() => return Ok(()),
                Ok(()) => {}
                Err(e) => tracing::warn!("STT connect attempt {} failed: {}", attempt, e),
            }

            if attempt < attempts {
                tokio::time::sleep(self.inner.options.connect_pause).await;
            }
        }

        Err(RealtimeError::SidecarConnectExhausted { attempts })
    }

    /// Start the periodic flush timer. Calling it again while running is a
    /// no-op.
    pub fn start(&self) {
        let mut interval = self.inner.interval.lock();
        if interval.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let period = self.inner.options.flush_interval;
        let weak: Weak<SttInner> = Arc::downgrade(&self.inner);
        *interval = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let stt = SttClient { inner };
                if let Err(e) = stt.process_audio_buffer().await {
                    tracing::debug!("Periodic STT flush failed: {}", e);
                }
            }
        }));
        tracing::debug!("STT flush timer started ({:?})", period);
    }

    pub fn stop_processing_interval(&self) {
        if let Some(handle) = self.inner.interval.lock().take() {
            handle.abort();
            tracing::debug!("STT flush timer stopped");
        }
    }

    /// Stop the timer and close the dedicated connection.
    ///
    /// Safe to call outside a Tokio runtime; see [`LiveClient::disconnect`].
    pub fn dispose(&self) {
        self.stop_processing_interval();
        self.inner.client.disconnect(None);
    }

    /// Feed this sidecar from a primary client.
    ///
    /// Model audio is buffered; `turncomplete` and `interrupted` trigger a
    /// flush.
    pub fn attach(&self, primary: &LiveClient) -> SttAttachment {
        let signals = primary.signals();

        let weak = Arc::downgrade(&self.inner);
        let audio = signals.audio.connect(move |data: &Bytes| {
            if let Some(inner) = weak.upgrade() {
                inner.add_audio(data.clone());
            }
        });

        let turncomplete = signals.turncomplete.connect(self.flush_trigger("turncomplete"));
        let interrupted = signals.interrupted.connect(self.flush_trigger("interrupted"));

        SttAttachment {
            audio,
            turncomplete,
            interrupted,
        }
    }

    /// Remove the listeners installed by [`attach`](Self::attach).
    pub fn detach(&self, primary: &LiveClient, attachment: SttAttachment) {
        let signals = primary.signals();
        signals.audio.disconnect(attachment.audio);
        signals.turncomplete.disconnect(attachment.turncomplete);
        signals.interrupted.disconnect(attachment.interrupted);
    }

    fn flush_trigger(&self, trigger: &'static str) -> impl Fn(&()) + Send + Sync + 'static {
        let weak = Arc::downgrade(&self.inner);
        move |_| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            tracing::debug!("STT flush requested by {}", trigger);
            let stt = SttClient { inner };
            tokio::spawn(async move {
                if let Err(e) = stt.process_audio_buffer().await {
                    tracing::debug!("STT flush on {} failed: {}", trigger, e);
                }
            });
        }
    }
}
