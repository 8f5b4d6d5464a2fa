//! Configuration for the transcription sidecar.
//!
//! The sidecar runs its own connection with deterministic decoding so that
//! repeated flushes of the same audio transcribe the same way.

use std::time::Duration;

use crate::core::realtime::{GenerationConfig, LiveConfig};

/// Model used for transcription.
pub const STT_MODEL: &str = "models/gemini-2.0-flash-exp";

/// MIME type of the audio submitted for transcription.
pub const STT_AUDIO_MIME_TYPE: &str = "audio/pcm;rate=16000";

/// Instruction part sent alongside each flushed audio payload.
pub const TRANSCRIBE_INSTRUCTION: &str =
    "Transcribe this audio to text. Only return the transcription, nothing else.";

/// Default period of the flush timer.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of connect attempts per flush.
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;

/// Default pause between connect attempts.
pub const DEFAULT_CONNECT_PAUSE: Duration = Duration::from_millis(500);

/// Sidecar timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SttOptions {
    /// Period of the flush timer started by `start()`
    pub flush_interval: Duration,
    /// Connect attempts per flush before giving up
    pub connect_attempts: u32,
    /// Pause between failed connect attempts
    pub connect_pause: Duration,
}

impl Default for SttOptions {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            connect_pause: DEFAULT_CONNECT_PAUSE,
        }
    }
}

/// Session config for the transcription connection.
pub fn transcription_session_config() -> LiveConfig {
    LiveConfig::new(STT_MODEL).with_generation_config(GenerationConfig {
        temperature: Some(0.0),
        top_p: Some(1.0),
        top_k: Some(32),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcription_session_config_is_deterministic() {
        let config = transcription_session_config();
        let generation = config.generation_config.unwrap();

        assert_eq!(config.model, STT_MODEL);
        assert_eq!(generation.temperature, Some(0.0));
        assert_eq!(generation.top_p, Some(1.0));
        assert_eq!(generation.top_k, Some(32));
        assert!(config.system_instruction.is_none());
    }

    #[test]
    fn test_default_options() {
        let options = SttOptions::default();
        assert_eq!(options.flush_interval, Duration::from_secs(5));
        assert_eq!(options.connect_attempts, 3);
        assert_eq!(options.connect_pause, Duration::from_millis(500));
    }
}
