//! Transcription sidecar.
//!
//! A second, isolated live connection that turns buffered audio into
//! transcription signals independently of the primary conversation.

mod client;
mod config;

pub use client::{FlushOutcome, SttAttachment, SttClient, SttSignals};
pub use config::{
    DEFAULT_CONNECT_ATTEMPTS, DEFAULT_CONNECT_PAUSE, DEFAULT_FLUSH_INTERVAL, STT_AUDIO_MIME_TYPE,
    STT_MODEL, SttOptions, TRANSCRIBE_INSTRUCTION, transcription_session_config,
};
