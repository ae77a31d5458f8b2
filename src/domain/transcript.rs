//! Transcript payloads returned by extraction agents.

use serde::{Deserialize, Serialize};

/// Start offset of a transcript entry as the platform reports it.
///
/// The platform is inconsistent: sometimes seconds, milliseconds or ticks
/// as a number, sometimes an `HH:MM:SS.fff` string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Offset {
    Number(f64),
    Text(String),
}

/// One timed line of a transcript
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    #[serde(default)]
    pub speaker_display_name: Option<String>,

    #[serde(default)]
    pub start_offset: Option<Offset>,

    #[serde(default)]
    pub text: Option<String>,
}

impl TranscriptEntry {
    pub fn new(speaker: impl Into<String>, start_offset: Offset, text: impl Into<String>) -> Self {
        Self {
            speaker_display_name: Some(speaker.into()),
            start_offset: Some(start_offset),
            text: Some(text.into()),
        }
    }
}

/// A transcript the agent located and fetched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptFound {
    /// Platform identifier of the transcript, when known
    #[serde(default)]
    pub transcript_id: Option<String>,

    /// Meeting title
    #[serde(default)]
    pub title: String,

    /// `YYYYMMDD_HHMMSS` when the recording name carried one
    #[serde(default)]
    pub scheduled_start: String,

    #[serde(default)]
    pub entries: Vec<TranscriptEntry>,
}
