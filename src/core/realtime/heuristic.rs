//! Text disambiguation: raw transcription vs. assistant utterance.
//!
//! The service answers both "transcribe this" requests and ordinary
//! conversation on the same channel. This is a best-effort, deterministic
//! classifier over the reply text; it does not try to be accurate on every
//! input, only stable.

use serde::{Deserialize, Serialize};

/// Substrings that mark prose, markdown, links or an explanation wrapped
/// around a transcription.
pub const NON_TRANSCRIPTION_MARKERS: &[&str] = &[
    "```",
    "**",
    "*",
    "#",
    "- ",
    "1. ",
    "http",
    "www.",
    "I'll transcribe",
    "Here's the transcription",
    "The transcription is",
];

/// Texts shorter than this (in characters) are treated as transcriptions.
pub const SHORT_TEXT_THRESHOLD: usize = 200;

/// More paragraphs than this marks an assistant utterance.
pub const MAX_TRANSCRIPTION_PARAGRAPHS: usize = 2;

/// Outcome of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextKind {
    Transcription,
    AssistantUtterance,
}

/// Classify reply text.
///
/// Rules, first match wins:
/// 1. any marker from [`NON_TRANSCRIPTION_MARKERS`] -> assistant utterance
/// 2. fewer than [`SHORT_TEXT_THRESHOLD`] characters -> transcription
/// 3. more than [`MAX_TRANSCRIPTION_PARAGRAPHS`] non-empty paragraphs -> assistant utterance
/// 4. otherwise -> transcription
pub fn classify(text: &str) -> TextKind {
    if NON_TRANSCRIPTION_MARKERS
        .iter()
        .any(|marker| text.contains(marker))
    {
        return TextKind::AssistantUtterance;
    }

    if text.chars().count() < SHORT_TEXT_THRESHOLD {
        return TextKind::Transcription;
    }

    let paragraphs = text
        .split("\n\n")
        .filter(|paragraph| !paragraph.trim().is_empty())
        .count();
    if paragraphs > MAX_TRANSCRIPTION_PARAGRAPHS {
        return TextKind::AssistantUtterance;
    }

    TextKind::Transcription
}

/// Shorthand for `classify(text) == TextKind::Transcription`.
#[inline]
pub fn is_likely_transcription(text: &str) -> bool {
    classify(text) == TextKind::Transcription
}
