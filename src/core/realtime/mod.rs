//! Live streaming protocol client.
//!
//! This module provides the client for the bidirectional generate-content
//! endpoint: connection lifecycle, inbound frame classification, the
//! transcription heuristic, and outbound multiplexing.
//!
//! # Architecture
//!
//! - `transport` - socket seam (`Connector`), WebSocket implementation
//! - `messages` - wire frames, both directions
//! - `classifier` - inbound frame -> ordered `LiveEvent`s
//! - `heuristic` - transcription vs. assistant utterance
//! - `client` - `LiveClient`, connection manager and outbound multiplexer
//!
//! # Audio Format
//!
//! Inbound audio parts carry base64 16-bit PCM under an `audio/pcm*` MIME
//! type; they are decoded before being emitted on the `audio` signal.

mod base;
mod classifier;
mod client;
mod heuristic;
mod messages;
mod transport;

pub use base::{
    ABNORMAL_CLOSURE, ClientOptions, CloseEvent, DEFAULT_CONNECT_TIMEOUT, DEFAULT_RECONNECT_DELAY,
    DEFAULT_SEND_RETRY_DELAY, NORMAL_CLOSURE, ReadyState, RealtimeError, RealtimeResult,
    StreamingLog,
};
pub use classifier::{LiveEvent, classify_message};
pub use client::{LiveClient, LiveSignals, SocketId};
pub use heuristic::{
    MAX_TRANSCRIPTION_PARAGRAPHS, NON_TRANSCRIPTION_MARKERS, SHORT_TEXT_THRESHOLD, TextKind,
    classify, is_likely_transcription,
};
pub use messages::{
    AUDIO_PCM_MIME_PREFIX, Blob, ClientContent, Content, FunctionCall, FunctionResponse,
    GenerationConfig, LiveConfig, LiveIncomingMessage, LiveOutgoingMessage, ModelTurn, Part,
    PrebuiltVoiceConfig, RealtimeInput, ResponseModality, ServerContent, SpeechConfig, ToolCall,
    ToolCallCancellation, ToolResponse, VoiceConfig,
};
pub use transport::{
    Connector, FrameSink, FrameSource, NO_STATUS_RECEIVED, Transport, TransportEvent,
    WebSocketConnector,
};
