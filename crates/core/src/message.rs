use serde::{Deserialize, Serialize};

/// Front-end channel a turn arrived on. Channel-specific asynchrony (audio
/// streaming, partial transcription) is resolved before the orchestrator is
/// invoked; voice turns carry a transcript confidence instead.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Text,
    Voice,
}

/// One user turn as received from the front-end surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    pub session_id: String,
    pub channel: Channel,
    pub content: String,
    /// Speech-to-text confidence for voice turns; None for text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_confidence: Option<f64>,
}

impl TurnRequest {
    pub fn text(session_id: &str, content: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            channel: Channel::Text,
            content: content.to_string(),
            transcript_confidence: None,
        }
    }

    pub fn voice(session_id: &str, content: &str, transcript_confidence: f64) -> Self {
        Self {
            session_id: session_id.to_string(),
            channel: Channel::Voice,
            content: content.to_string(),
            transcript_confidence: Some(transcript_confidence),
        }
    }
}

/// Channel-neutral output ready for the text/voice front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelOutput {
    pub text: String,
    pub metadata: serde_json::Value,
}
