//! OpenAI Realtime API defaults and enumerations used for phone calls.

use serde::{Deserialize, Serialize};

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-mini-realtime-preview";
pub const DEFAULT_VOICE: &str = "sage";
pub const DEFAULT_TEMPERATURE: f32 = 0.6;
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Inbound event types worth logging at info level.
pub const LOG_EVENT_TYPES: &[&str] = &[
    "error",
    "session.created",
    "response.audio.delta",
    "response.audio_transcript.done",
    "conversation.item.input_audio_transcription.completed",
];

/// Voices accepted by the Realtime API.
pub const SUPPORTED_VOICES: &[&str] = &[
    "alloy", "ash", "ballad", "coral", "echo", "sage", "shimmer", "verse",
];

pub fn is_supported_voice(voice: &str) -> bool {
    SUPPORTED_VOICES.contains(&voice.to_lowercase().as_str())
}

// =============================================================================
// Audio Formats
// =============================================================================

/// Audio codecs the Realtime API can exchange.
///
/// Telephony media streams carry 8 kHz G.711 u-law, which is the default here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AudioFormat {
    #[serde(rename = "pcm16")]
    Pcm16,
    #[default]
    #[serde(rename = "g711_ulaw")]
    G711Ulaw,
    #[serde(rename = "g711_alaw")]
    G711Alaw,
}

impl AudioFormat {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pcm16 => "pcm16",
            Self::G711Ulaw => "g711_ulaw",
            Self::G711Alaw => "g711_alaw",
        }
    }

    /// Parse a configured format name. Unknown names yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pcm16" | "pcm" => Some(Self::Pcm16),
            "g711_ulaw" | "ulaw" | "mulaw" => Some(Self::G711Ulaw),
            "g711_alaw" | "alaw" => Some(Self::G711Alaw),
            _ => None,
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output modalities requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Audio,
}
