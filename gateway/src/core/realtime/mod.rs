//! Realtime speech-to-speech AI session adapter.
//!
//! # Architecture
//!
//! - `BaseRealtime` trait for the adapter contract
//! - `OpenAIRealtime` WebSocket implementation
//! - `RealtimeEvent` channel instead of per-event callbacks

mod base;
pub mod openai;

pub use base::{
    BaseRealtime, BoxedRealtime, ConnectionState, RealtimeConfig, RealtimeError, RealtimeEvent,
    RealtimeEventSender, RealtimeResult,
};
pub use openai::{OpenAIRealtime, ServerEvent};

/// Create the realtime adapter for a call.
pub fn create_realtime_provider(config: RealtimeConfig) -> RealtimeResult<BoxedRealtime> {
    Ok(Box::new(OpenAIRealtime::new(config)?))
}
