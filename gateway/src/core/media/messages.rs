//! Wire format of the telephony media stream.
//!
//! Inbound frames carry an `event` discriminator. Only `start`, `media` and
//! `mark` drive the call; everything else is surfaced as
//! [`MediaEvent::Other`] so callers can log and skip it.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{MediaError, MediaResult};

/// Name of the mark sent after each forwarded AI audio chunk.
pub const RESPONSE_MARK_NAME: &str = "responsePart";

// =============================================================================
// Inbound
// =============================================================================

/// Custom parameters attached to the stream by the call setup.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomParameters {
    #[serde(default)]
    pub from_number: String,
    #[serde(default)]
    pub to_number: String,
    #[serde(default)]
    pub call_context: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartPayload {
    pub stream_sid: String,
    #[serde(default)]
    pub call_sid: Option<String>,
    #[serde(default)]
    pub custom_parameters: CustomParameters,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MediaPayload {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: u64,
    pub payload: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct MarkPayload {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum KnownEvent {
    Start {
        start: StartPayload,
    },
    Media {
        media: MediaPayload,
    },
    Mark {
        #[serde(default)]
        mark: Option<MarkPayload>,
    },
}

/// A parsed inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    Start(StartPayload),
    Media(MediaPayload),
    Mark(MarkPayload),
    Other { event: String },
}

impl MediaEvent {
    /// Parse one text frame from the media stream.
    ///
    /// Fails only when the frame is not JSON or a known event is missing
    /// required fields. Unknown events are not errors.
    pub fn parse(text: &str) -> MediaResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| MediaError::InvalidFrame(format!("Invalid JSON: {e}")))?;

        let event = value
            .get("event")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match event.as_str() {
            "start" | "media" | "mark" => {
                let known: KnownEvent = serde_json::from_value(value).map_err(|e| {
                    MediaError::InvalidFrame(format!("Malformed '{event}' event: {e}"))
                })?;
                Ok(match known {
                    KnownEvent::Start { start } => Self::Start(start),
                    KnownEvent::Media { media } => Self::Media(media),
                    KnownEvent::Mark { mark } => Self::Mark(mark.unwrap_or_default()),
                })
            }
            _ => Ok(Self::Other { event }),
        }
    }
}

/// The stream sends timestamps as decimal strings; accept numbers too.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Timestamp {
        Number(u64),
        Text(String),
    }

    match Timestamp::deserialize(deserializer)? {
        Timestamp::Number(n) => Ok(n),
        Timestamp::Text(s) => s.trim().parse::<u64>().map_err(serde::de::Error::custom),
    }
}

// =============================================================================
// Outbound
// =============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutboundMedia {
    pub payload: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutboundMark {
    pub name: String,
}

/// Commands sent back over the media stream.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutboundMessage {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutboundMedia,
    },
    Mark {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        mark: OutboundMark,
    },
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

impl OutboundMessage {
    pub fn to_json(&self) -> MediaResult<String> {
        serde_json::to_string(self).map_err(|e| MediaError::Serialization(e.to_string()))
    }
}
