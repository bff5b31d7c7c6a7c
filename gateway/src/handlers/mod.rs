//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check and session count endpoints
//! - `call_stream` - Telephony media stream WebSocket

pub mod api;
pub mod call_stream;

pub use call_stream::call_stream_handler;
