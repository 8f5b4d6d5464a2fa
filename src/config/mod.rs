//! Client configuration
//!
//! Connection-level settings for the live client and its transcription
//! sidecar, loaded from environment variables and an optional YAML file.
//! Priority: YAML > ENV vars > .env values > defaults.
//!
//! The session config sent in the `setup` frame ([`LiveConfig`]) is separate;
//! a YAML file may carry one under `session`.
//!
//! # Example
//! ```rust,no_run
//! use waav_live::config::ClientConfig;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ClientConfig::from_env()?;
//!
//! // Load from YAML file with environment variable base
//! let config = ClientConfig::from_file(Path::new("config.yaml"))?;
//! println!("Connecting to {}", config.endpoint);
//! # Ok(())
//! # }
//! ```

use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

mod yaml;

pub use yaml::{ConnectionYaml, SttYaml, YamlConfig};

use crate::core::realtime::{
    ClientOptions, DEFAULT_CONNECT_TIMEOUT, DEFAULT_RECONNECT_DELAY, DEFAULT_SEND_RETRY_DELAY,
    LiveConfig,
};
use crate::core::stt::{
    DEFAULT_CONNECT_ATTEMPTS, DEFAULT_CONNECT_PAUSE, DEFAULT_FLUSH_INTERVAL, SttOptions,
};
use crate::utils::url_validation::{UrlValidationError, build_endpoint_url, validate_endpoint_url};

/// Default live endpoint.
pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";

pub const ENV_API_KEY: &str = "LIVE_API_KEY";
pub const ENV_STT_API_KEY: &str = "LIVE_STT_API_KEY";
pub const ENV_ENDPOINT: &str = "LIVE_ENDPOINT";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "LIVE_CONNECT_TIMEOUT_MS";
pub const ENV_RECONNECT_DELAY_MS: &str = "LIVE_RECONNECT_DELAY_MS";
pub const ENV_SEND_RETRY_DELAY_MS: &str = "LIVE_SEND_RETRY_DELAY_MS";
pub const ENV_STT_FLUSH_INTERVAL_MS: &str = "LIVE_STT_FLUSH_INTERVAL_MS";
pub const ENV_STT_CONNECT_ATTEMPTS: &str = "LIVE_STT_CONNECT_ATTEMPTS";
pub const ENV_STT_CONNECT_PAUSE_MS: &str = "LIVE_STT_CONNECT_PAUSE_MS";

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to parse YAML config: {0}")]
    Parse(String),

    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Missing API key: set LIVE_API_KEY or connection.api_key")]
    MissingApiKey,

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(#[from] UrlValidationError),
}

/// Client configuration
#[derive(Clone, PartialEq)]
pub struct ClientConfig {
    pub api_key: String,
    /// Key for the transcription sidecar; `None` means use `api_key`
    pub stt_api_key: Option<String>,
    pub endpoint: String,

    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
    pub send_retry_delay: Duration,

    pub stt_flush_interval: Duration,
    pub stt_connect_attempts: u32,
    pub stt_connect_pause: Duration,

    /// Session config from YAML, if any
    pub session: Option<LiveConfig>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"***")
            .field("stt_api_key", &self.stt_api_key.as_ref().map(|_| "***"))
            .field("endpoint", &self.endpoint)
            .field("connect_timeout", &self.connect_timeout)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("send_retry_delay", &self.send_retry_delay)
            .field("stt_flush_interval", &self.stt_flush_interval)
            .field("stt_connect_attempts", &self.stt_connect_attempts)
            .field("stt_connect_pause", &self.stt_connect_pause)
            .field("session", &self.session)
            .finish()
    }
}

/// Zeroize both keys when the config is dropped.
impl Drop for ClientConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        self.api_key.zeroize();
        if let Some(ref mut key) = self.stt_api_key {
            key.zeroize();
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// `.env` is expected to have been loaded by the caller (the binary does
    /// this at startup).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::merge(None)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables
    /// 3. Default values
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml_config = YamlConfig::from_file(path)?;
        Self::merge(Some(yaml_config))
    }

    fn merge(yaml: Option<YamlConfig>) -> Result<Self, ConfigError> {
        let yaml = yaml.unwrap_or_default();
        let connection = yaml.connection.unwrap_or_default();
        let stt = yaml.stt.unwrap_or_default();

        let api_key = connection
            .api_key
            .or_else(|| env_string(ENV_API_KEY))
            .ok_or(ConfigError::MissingApiKey)?;

        let stt_api_key = stt.api_key.or_else(|| env_string(ENV_STT_API_KEY));

        let endpoint = connection
            .endpoint
            .or_else(|| env_string(ENV_ENDPOINT))
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let config = Self {
            api_key,
            stt_api_key,
            endpoint,
            connect_timeout: millis(
                connection.connect_timeout_ms,
                ENV_CONNECT_TIMEOUT_MS,
                DEFAULT_CONNECT_TIMEOUT,
            )?,
            reconnect_delay: millis(
                connection.reconnect_delay_ms,
                ENV_RECONNECT_DELAY_MS,
                DEFAULT_RECONNECT_DELAY,
            )?,
            send_retry_delay: millis(
                connection.send_retry_delay_ms,
                ENV_SEND_RETRY_DELAY_MS,
                DEFAULT_SEND_RETRY_DELAY,
            )?,
            stt_flush_interval: millis(
                stt.flush_interval_ms,
                ENV_STT_FLUSH_INTERVAL_MS,
                DEFAULT_FLUSH_INTERVAL,
            )?,
            stt_connect_attempts: match stt.connect_attempts {
                Some(attempts) => attempts,
                None => env_parse(ENV_STT_CONNECT_ATTEMPTS)?.unwrap_or(DEFAULT_CONNECT_ATTEMPTS),
            },
            stt_connect_pause: millis(
                stt.connect_pause_ms,
                ENV_STT_CONNECT_PAUSE_MS,
                DEFAULT_CONNECT_PAUSE,
            )?,
            session: yaml.session,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the merged configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        validate_endpoint_url(&self.endpoint)?;
        if self.stt_flush_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: ENV_STT_FLUSH_INTERVAL_MS,
                value: "0".to_string(),
            });
        }
        if self.stt_connect_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                name: ENV_STT_CONNECT_ATTEMPTS,
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Socket URL for the primary conversation.
    pub fn live_url(&self) -> Result<String, ConfigError> {
        Ok(build_endpoint_url(&self.endpoint, &self.api_key)?)
    }

    /// Key used by the transcription sidecar.
    pub fn stt_key(&self) -> &str {
        match self.stt_api_key.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => {
                tracing::warn!(
                    "No dedicated STT key configured ({}), sharing the primary key",
                    ENV_STT_API_KEY
                );
                &self.api_key
            }
        }
    }

    /// Socket URL for the transcription sidecar.
    pub fn stt_url(&self) -> Result<String, ConfigError> {
        Ok(build_endpoint_url(&self.endpoint, self.stt_key())?)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            connect_timeout: self.connect_timeout,
            reconnect_delay: self.reconnect_delay,
            send_retry_delay: self.send_retry_delay,
        }
    }

    pub fn stt_options(&self) -> SttOptions {
        SttOptions {
            flush_interval: self.stt_flush_interval,
            connect_attempts: self.stt_connect_attempts,
            connect_pause: self.stt_connect_pause,
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env_string(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(None),
    }
}

fn millis(
    yaml_value: Option<u64>,
    env_name: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let value = match yaml_value {
        Some(ms) => Some(ms),
        None => env_parse::<u64>(env_name)?,
    };
    Ok(value.map(Duration::from_millis).unwrap_or(default))
}
