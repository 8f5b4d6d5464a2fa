//! Inbound frame classification.
//!
//! Turns one decoded [`LiveIncomingMessage`] into the ordered list of events the
//! client emits for it. Ordering guarantees within one frame:
//! - `interrupted` / `turncomplete` come before anything derived from `modelTurn`
//! - audio events come before the text event
//! - the text event (at most one) comes before the `content` event

use bytes::Bytes;

use super::heuristic::{TextKind, classify};
use super::messages::{
    LiveIncomingMessage, ModelTurn, Part, ServerContent, ToolCall, ToolCallCancellation,
};

/// Event derived from an inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    ToolCall(ToolCall),
    ToolCallCancellation(ToolCallCancellation),
    SetupComplete,
    Interrupted,
    TurnComplete,
    /// Decoded PCM audio from one audio part
    Audio(Bytes),
    /// Text the heuristic judged to be a transcription
    Transcription(String),
    /// Text the heuristic judged to be an assistant utterance
    ModelText(String),
    /// The non-audio parts of a model turn
    Content(ModelTurn),
    /// Frame matched no known kind
    Unmatched(serde_json::Value),
}

/// Classify a decoded frame into events, in emission order.
pub fn classify_message(message: LiveIncomingMessage) -> Vec<LiveEvent> {
    match message {
        LiveIncomingMessage::ToolCall(call) => vec![LiveEvent::ToolCall(call)],
        LiveIncomingMessage::ToolCallCancellation(cancel) => {
            vec![LiveEvent::ToolCallCancellation(cancel)]
        }
        LiveIncomingMessage::SetupComplete => vec![LiveEvent::SetupComplete],
        LiveIncomingMessage::ServerContent(content) => classify_server_content(content),
        LiveIncomingMessage::Unrecognized(value) => vec![LiveEvent::Unmatched(value)],
    }
}

fn classify_server_content(content: ServerContent) -> Vec<LiveEvent> {
    if content.interrupted.unwrap_or(false) {
        return vec![LiveEvent::Interrupted];
    }

    let mut events = Vec::new();

    if content.turn_complete.unwrap_or(false) {
        events.push(LiveEvent::TurnComplete);
    }

    let Some(model_turn) = content.model_turn else {
        return events;
    };

    let (audio_parts, other_parts): (Vec<Part>, Vec<Part>) =
        model_turn.parts.into_iter().partition(Part::is_audio);

    for part in &audio_parts {
        let Some(blob) = part.inline_data.as_ref() else {
            continue;
        };
        match blob.decode() {
            Ok(data) => events.push(LiveEvent::Audio(Bytes::from(data))),
            Err(e) => tracing::warn!("Dropping undecodable audio part ({}): {}", blob.mime_type, e),
        }
    }

    // Text normally lives in the non-audio parts; an audio part may still carry
    // text, so fall back to it rather than drop it.
    let text = join_text(&other_parts).or_else(|| join_text(&audio_parts));
    if let Some(text) = text
        && !text.trim().is_empty()
    {
        events.push(match classify(&text) {
            TextKind::Transcription => LiveEvent::Transcription(text),
            TextKind::AssistantUtterance => LiveEvent::ModelText(text),
        });
    }

    if !other_parts.is_empty() {
        events.push(LiveEvent::Content(ModelTurn { parts: other_parts }));
    }

    events
}

fn join_text(parts: &[Part]) -> Option<String> {
    let texts: Vec<&str> = parts.iter().filter_map(Part::text_content).collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.join(" "))
    }
}
