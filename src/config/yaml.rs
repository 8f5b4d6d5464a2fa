use serde::Deserialize;
use std::path::Path;

use super::ConfigError;
use crate::core::realtime::LiveConfig;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// connection:
///   endpoint: "wss://generativelanguage.googleapis.com/ws/..."
///   api_key: "your-api-key"
///   connect_timeout_ms: 10000
///   reconnect_delay_ms: 3000
///   send_retry_delay_ms: 1000
///
/// stt:
///   api_key: "your-stt-key"
///   flush_interval_ms: 5000
///   connect_attempts: 3
///   connect_pause_ms: 500
///
/// session:
///   model: "models/gemini-2.0-flash-exp"
///   generationConfig:
///     responseModalities: "audio"
///     speechConfig:
///       voiceConfig:
///         prebuiltVoiceConfig:
///           voiceName: "Fenrir"
///   systemInstruction:
///     parts:
///       - text: "You are a helpful assistant."
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub connection: Option<ConnectionYaml>,
    pub stt: Option<SttYaml>,
    /// Session config sent in the `setup` frame, in wire (camelCase) form
    pub session: Option<LiveConfig>,
}

/// Primary connection settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ConnectionYaml {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub connect_timeout_ms: Option<u64>,
    pub reconnect_delay_ms: Option<u64>,
    pub send_retry_delay_ms: Option<u64>,
}

/// Transcription sidecar settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SttYaml {
    pub api_key: Option<String>,
    pub flush_interval_ms: Option<u64>,
    pub connect_attempts: Option<u32>,
    pub connect_pause_ms: Option<u64>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
