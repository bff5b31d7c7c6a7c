//! Telephony media stream adapter.

pub mod messages;
pub mod transport;

use thiserror::Error;

pub use messages::{
    CustomParameters, MarkPayload, MediaEvent, MediaPayload, OutboundMessage, RESPONSE_MARK_NAME,
    StartPayload,
};
pub use transport::{MediaRoute, MediaTransport};

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Invalid media frame: {0}")]
    InvalidFrame(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type MediaResult<T> = Result<T, MediaError>;
