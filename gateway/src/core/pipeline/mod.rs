//! Separate speech-to-text, chat and text-to-speech collaborators.
//!
//! These back the pipeline call mode, where caller audio is transcribed,
//! answered by a chat model and spoken back by a synthesizer.

pub mod chat;
mod process;
pub mod stt;
pub mod tts;

use thiserror::Error;
use tokio::sync::mpsc;

pub use chat::{ChatProvider, ChatService, ChatServiceConfig, OpenAiCompatibleChat};
pub use stt::{SpeechToText, SubprocessStt};
pub use tts::{SubprocessTts, TextToSpeech};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to start worker process: {0}")]
    ProcessSpawn(String),

    #[error("Worker I/O error: {0}")]
    Io(String),

    #[error("Audio decoding error: {0}")]
    AudioDecoding(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Chat API error ({status}): {message}")]
    ChatApi { status: u16, message: String },

    #[error("Not started")]
    NotStarted,
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Output of the speech workers.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Final recognized caller speech.
    Transcription(String),
    /// Synthesized telephony audio, base64 encoded.
    SynthesizedAudio {
        payload: String,
        sample_rate: Option<u32>,
    },
    /// A worker process exited.
    WorkerExited { worker: &'static str },
}

pub type PipelineEventSender = mpsc::UnboundedSender<PipelineEvent>;
