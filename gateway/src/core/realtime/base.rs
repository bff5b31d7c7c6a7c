//! Base traits and types for the realtime AI session adapter.
//!
//! An adapter owns one outbound connection to a speech-to-speech AI backend.
//! Instead of per-event callbacks it reports everything that happens on the
//! connection as [`RealtimeEvent`] values on a single channel supplied to
//! [`BaseRealtime::initialize`].

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::openai::messages::ServerEvent;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during realtime operations.
///
/// Failures after connecting are reported on the event channel, so only
/// setup returns an error.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Connection settings for a realtime AI session.
#[derive(Clone, Default)]
pub struct RealtimeConfig {
    /// API key used as a bearer token
    pub api_key: String,
    /// WebSocket endpoint, without the model query parameter
    pub url: String,
    /// Model name, appended as `?model=`
    pub model: String,
    /// Voice identity for synthesized speech
    pub voice: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Audio codec used in both directions (e.g. `g711_ulaw`)
    pub audio_format: String,
    /// Model used to transcribe caller speech. `None` disables transcription.
    pub transcription_model: Option<String>,
}

impl fmt::Debug for RealtimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeConfig")
            .field("api_key", &"<redacted>")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("temperature", &self.temperature)
            .field("audio_format", &self.audio_format)
            .field("transcription_model", &self.transcription_model)
            .finish()
    }
}

// =============================================================================
// Connection State
// =============================================================================

/// Connection state for realtime providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected to the provider
    #[default]
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Connected and ready
    Connected,
    /// Closed, either locally or by the provider
    Closed,
    /// Connection failed
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Closed => write!(f, "Closed"),
            ConnectionState::Failed => write!(f, "Failed"),
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Everything an adapter reports about its connection.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    /// The handshake completed; commands may now be sent.
    Opened,
    /// A parsed inbound message.
    Message(ServerEvent),
    /// The connection is gone. No further events follow.
    Closed { reason: Option<String> },
    /// A connection-level failure.
    Error(String),
}

pub type RealtimeEventSender = mpsc::UnboundedSender<RealtimeEvent>;

// =============================================================================
// Trait
// =============================================================================

/// Outbound connection to a realtime AI backend.
///
/// Every command is a silent no-op while the connection is not open.
#[async_trait]
pub trait BaseRealtime: Send + Sync {
    /// Start connecting. Returns once the attempt is under way; completion is
    /// reported as [`RealtimeEvent::Opened`] on `events`.
    async fn initialize(&mut self, events: RealtimeEventSender) -> RealtimeResult<()>;

    /// Send the one-time session configuration with the given instructions.
    async fn initialize_session(&mut self, instructions: &str) -> RealtimeResult<()>;

    /// Append an encoded audio chunk to the input buffer.
    async fn send_audio(&mut self, payload: &str) -> RealtimeResult<()>;

    /// Discard generated audio for `item_id` past `elapsed_ms` of playback.
    async fn truncate_assistant_response(
        &mut self,
        item_id: &str,
        elapsed_ms: u64,
    ) -> RealtimeResult<()>;

    /// Close the connection. Safe to call repeatedly.
    async fn close(&mut self) -> RealtimeResult<()>;

    fn is_connected(&self) -> bool;

    fn connection_state(&self) -> ConnectionState;
}

pub type BoxedRealtime = Box<dyn BaseRealtime>;
