//! Wire types for the bidirectional generate-content protocol.
//!
//! Every frame is one JSON object whose single top-level key names its kind.
//!
//! # Protocol Overview
//!
//! Client frames (sent to server):
//! - `setup` - Session configuration, sent once right after the socket opens
//! - `realtimeInput` - Batch of base64 media chunks (audio/pcm, image/jpeg)
//! - `clientContent` - One user turn made of parts
//! - `toolResponse` - Results for previously received tool calls
//!
//! Server frames (received from server):
//! - `setupComplete` - Setup acknowledged
//! - `serverContent` - Model output: `interrupted`, `turnComplete`, `modelTurn`
//! - `toolCall` - Function calls the client should execute
//! - `toolCallCancellation` - Previously issued calls to abandon

use base64::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::base::{RealtimeError, RealtimeResult};

/// MIME prefix identifying PCM audio parts.
pub const AUDIO_PCM_MIME_PREFIX: &str = "audio/pcm";

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration sent in the `setup` frame.
///
/// Required before the first successful connect. Changing it requires a new
/// connect attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveConfig {
    /// Model identifier, e.g. `models/gemini-2.0-flash-exp`
    pub model: String,

    /// Generation parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,

    /// System instruction text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,

    /// Tool declarations, passed through as-is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
}

impl LiveConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set the system instruction to a single text part.
    pub fn with_system_instruction(mut self, text: impl Into<String>) -> Self {
        self.system_instruction = Some(Content {
            role: None,
            parts: vec![Part::text(text)],
        });
        self
    }

    pub fn with_generation_config(mut self, generation_config: GenerationConfig) -> Self {
        self.generation_config = Some(generation_config);
        self
    }
}

/// Generation parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<ResponseModality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

/// Modality of the model's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseModality {
    Text,
    Audio,
    Image,
}

/// Voice selection for audio replies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_config: Option<VoiceConfig>,
}

impl SpeechConfig {
    /// Speech config selecting a prebuilt voice by name.
    pub fn prebuilt(voice_name: impl Into<String>) -> Self {
        Self {
            voice_config: Some(VoiceConfig {
                prebuilt_voice_config: Some(PrebuiltVoiceConfig {
                    voice_name: voice_name.into(),
                }),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prebuilt_voice_config: Option<PrebuiltVoiceConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

// =============================================================================
// Content
// =============================================================================

/// One party's contribution, made of parts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Smallest unit of turn content: inline text or an inline binary blob.
///
/// Fields the client does not model (function calls, executable code, ...)
/// are kept in `other` so they survive into `content` signals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn inline_data(blob: Blob) -> Self {
        Self {
            inline_data: Some(blob),
            ..Default::default()
        }
    }

    /// Whether this part carries PCM audio.
    pub fn is_audio(&self) -> bool {
        self.inline_data
            .as_ref()
            .is_some_and(|blob| blob.mime_type.starts_with(AUDIO_PCM_MIME_PREFIX))
    }

    /// Text of this part, if it has any.
    pub fn text_content(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }
}

/// Inline binary payload, base64 encoded on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

impl Blob {
    /// Build a blob from raw bytes.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: BASE64_STANDARD.encode(bytes),
        }
    }

    /// Decode the base64 payload.
    pub fn decode(&self) -> RealtimeResult<Vec<u8>> {
        BASE64_STANDARD
            .decode(&self.data)
            .map_err(|e| RealtimeError::SerializationError(e.to_string()))
    }
}

/// The `modelTurn` of a `serverContent` frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<Part>,
}

// =============================================================================
// Client Frames (sent to server)
// =============================================================================

/// Frames sent to the service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LiveOutgoingMessage {
    Setup(LiveConfig),
    RealtimeInput(RealtimeInput),
    ClientContent(ClientContent),
    ToolResponse(ToolResponse),
}

impl LiveOutgoingMessage {
    /// Wrap parts as one user-role turn.
    pub fn user_turn(parts: Vec<Part>, turn_complete: bool) -> Self {
        LiveOutgoingMessage::ClientContent(ClientContent {
            turns: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            turn_complete,
        })
    }

    pub fn realtime_input(media_chunks: Vec<Blob>) -> Self {
        LiveOutgoingMessage::RealtimeInput(RealtimeInput { media_chunks })
    }

    /// Serialize to the JSON text sent on the socket.
    pub fn to_json(&self) -> RealtimeResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<Blob>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

/// Results for tool calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    /// Id of the call being answered
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub response: Value,
}

// =============================================================================
// Server Frames (received from server)
// =============================================================================

/// Function calls requested by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// Tool calls the client should abandon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallCancellation {
    #[serde(default)]
    pub ids: Vec<String>,
}

/// Body of a `serverContent` frame. Any of the fields may co-occur.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub interrupted: Option<bool>,
    #[serde(default)]
    pub turn_complete: Option<bool>,
    #[serde(default)]
    pub model_turn: Option<ModelTurn>,
}

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveIncomingMessage {
    ToolCall(ToolCall),
    ToolCallCancellation(ToolCallCancellation),
    SetupComplete,
    ServerContent(ServerContent),
    /// Valid JSON with none of the known top-level keys
    Unrecognized(Value),
}

impl LiveIncomingMessage {
    /// Decode a frame.
    ///
    /// When several known keys are present, the highest priority wins:
    /// `toolCall` > `toolCallCancellation` > `setupComplete` > `serverContent`.
    pub fn decode(frame: &[u8]) -> RealtimeResult<Self> {
        let value: Value = serde_json::from_slice(frame)?;

        let Value::Object(mut object) = value else {
            return Ok(LiveIncomingMessage::Unrecognized(value));
        };

        if let Some(tool_call) = object.remove("toolCall") {
            return Ok(LiveIncomingMessage::ToolCall(serde_json::from_value(
                tool_call,
            )?));
        }
        if let Some(cancellation) = object.remove("toolCallCancellation") {
            return Ok(LiveIncomingMessage::ToolCallCancellation(
                serde_json::from_value(cancellation)?,
            ));
        }
        if object.contains_key("setupComplete") {
            return Ok(LiveIncomingMessage::SetupComplete);
        }
        if let Some(server_content) = object.remove("serverContent") {
            return Ok(LiveIncomingMessage::ServerContent(serde_json::from_value(
                server_content,
            )?));
        }

        Ok(LiveIncomingMessage::Unrecognized(Value::Object(object)))
    }
}
