//! OpenAI Realtime API adapter.
//!
//! # Supported Voices
//!
//! alloy, ash, ballad, coral, echo, sage, shimmer, verse
//!
//! # Audio Format
//!
//! Phone audio is exchanged as 8 kHz G.711 u-law in both directions, so
//! media payloads are forwarded without transcoding.

mod client;
pub mod config;
pub mod messages;

pub use client::OpenAIRealtime;
pub use config::{
    AudioFormat, DEFAULT_REALTIME_MODEL, DEFAULT_TEMPERATURE, DEFAULT_TRANSCRIPTION_MODEL,
    DEFAULT_VOICE, LOG_EVENT_TYPES, Modality, OPENAI_REALTIME_URL, SUPPORTED_VOICES,
    is_supported_voice,
};
pub use messages::{ClientEvent, ServerEvent, SessionConfig};
