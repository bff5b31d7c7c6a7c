//! Speech-to-text over a worker subprocess.
//!
//! The worker reads length-prefixed audio frames on stdin (4-byte
//! little-endian length, then the raw bytes) and prints one JSON object per
//! line on stdout: `{"type":"final"|"partial","text":"..."}`.

use async_trait::async_trait;
use base64::prelude::*;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::process::Worker;
use super::{PipelineError, PipelineEvent, PipelineEventSender, PipelineResult};

#[async_trait]
pub trait SpeechToText: Send {
    /// Start recognizing; final transcripts are reported on `events`.
    async fn start(&mut self, events: PipelineEventSender) -> PipelineResult<()>;

    /// Feed one base64 encoded audio chunk. No-op before `start`.
    async fn process_audio(&mut self, payload: &str) -> PipelineResult<()>;

    /// Stop the recognizer. Safe to call repeatedly.
    async fn close(&mut self);
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RecognizerOutput {
    Final {
        #[serde(default)]
        text: String,
    },
    Partial {},
    Error {
        #[serde(default)]
        message: String,
    },
}

/// Frame an audio chunk for the recognizer's stdin.
pub fn encode_frame(audio: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(audio.len() + 4);
    frame.extend_from_slice(&(audio.len() as u32).to_le_bytes());
    frame.extend_from_slice(audio);
    frame
}

/// Extract the final transcript from one recognizer output line, if any.
fn parse_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<RecognizerOutput>(line) {
        Ok(RecognizerOutput::Final { text }) if !text.trim().is_empty() => Some(text),
        Ok(RecognizerOutput::Error { message }) => {
            warn!("Speech recognizer error: {}", message);
            None
        }
        Ok(_) => None,
        Err(e) => {
            warn!("Failed to parse recognizer output: {}", e);
            None
        }
    }
}

pub struct SubprocessStt {
    command: Vec<String>,
    worker: Option<Worker>,
    reader: Option<JoinHandle<()>>,
}

impl SubprocessStt {
    pub fn new(command: Vec<String>) -> PipelineResult<Self> {
        if command.is_empty() {
            return Err(PipelineError::InvalidConfiguration(
                "STT command is required".to_string(),
            ));
        }
        Ok(Self {
            command,
            worker: None,
            reader: None,
        })
    }
}

#[async_trait]
impl SpeechToText for SubprocessStt {
    async fn start(&mut self, events: PipelineEventSender) -> PipelineResult<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        let (worker, stdout) = Worker::spawn("stt", &self.command)?;

        self.reader = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Some(text) = parse_line(&line) {
                            debug!("Recognized: {}", text);
                            if events.send(PipelineEvent::Transcription(text)).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(None) => {
                        info!("STT worker closed its output");
                        let _ = events.send(PipelineEvent::WorkerExited { worker: "stt" });
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to read STT output: {}", e);
                        let _ = events.send(PipelineEvent::WorkerExited { worker: "stt" });
                        break;
                    }
                }
            }
        }));
        self.worker = Some(worker);
        Ok(())
    }

    async fn process_audio(&mut self, payload: &str) -> PipelineResult<()> {
        let Some(worker) = self.worker.as_mut() else {
            return Ok(());
        };
        let audio = BASE64_STANDARD
            .decode(payload)
            .map_err(|e| PipelineError::AudioDecoding(e.to_string()))?;
        worker.write(&encode_frame(&audio)).await
    }

    async fn close(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.shutdown();
            info!("Closed STT worker");
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
