//! Text-to-speech over a worker subprocess.
//!
//! The worker reads `{"text":"..."}` JSON lines on stdin and prints
//! `{"type":"audio","data":"<base64 mulaw>","sample_rate":8000}` lines on
//! stdout, one or more per request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::process::Worker;
use super::{PipelineError, PipelineEvent, PipelineEventSender, PipelineResult};

#[async_trait]
pub trait TextToSpeech: Send {
    /// Start the synthesizer; audio chunks are reported on `events`.
    async fn start(&mut self, events: PipelineEventSender) -> PipelineResult<()>;

    /// Queue text for synthesis. No-op before `start`.
    async fn synthesize(&mut self, text: &str) -> PipelineResult<()>;

    /// Stop the synthesizer. Safe to call repeatedly.
    async fn close(&mut self);
}

#[derive(Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum SynthesizerOutput {
    Audio {
        data: String,
        #[serde(default)]
        sample_rate: Option<u32>,
    },
    Error {
        #[serde(default)]
        message: String,
    },
    #[serde(other)]
    Other,
}

fn parse_line(line: &str) -> Option<PipelineEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<SynthesizerOutput>(line) {
        Ok(SynthesizerOutput::Audio { data, sample_rate }) if !data.is_empty() => {
            Some(PipelineEvent::SynthesizedAudio {
                payload: data,
                sample_rate,
            })
        }
        Ok(SynthesizerOutput::Error { message }) => {
            warn!("Speech synthesizer error: {}", message);
            None
        }
        Ok(_) => None,
        Err(e) => {
            warn!("Failed to parse synthesizer output: {}", e);
            None
        }
    }
}

pub struct SubprocessTts {
    command: Vec<String>,
    worker: Option<Worker>,
    reader: Option<JoinHandle<()>>,
}

impl SubprocessTts {
    pub fn new(command: Vec<String>) -> PipelineResult<Self> {
        if command.is_empty() {
            return Err(PipelineError::InvalidConfiguration(
                "TTS command is required".to_string(),
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
impl TextToSpeech for SubprocessTts {
    async fn start(&mut self, events: PipelineEventSender) -> PipelineResult<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        let (worker, stdout) = Worker::spawn("tts", &self.command)?;

        self.reader = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(event) = parse_line(&line) {
                    if events.send(event).is_err() {
                        return;
                    }
                }
            }
            info!("TTS worker closed its output");
            let _ = events.send(PipelineEvent::WorkerExited { worker: "tts" });
        }));
        self.worker = Some(worker);
        Ok(())
    }

    async fn synthesize(&mut self, text: &str) -> PipelineResult<()> {
        let Some(worker) = self.worker.as_mut() else {
            return Ok(());
        };
        let mut line = serde_json::to_string(&SynthesisRequest { text })
            .map_err(|e| PipelineError::Io(format!("Failed to encode TTS request: {e}")))?;
        line.push('\n');
        debug!("Synthesizing {} chars", text.len());
        worker.write(line.as_bytes()).await
    }

    async fn close(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.shutdown();
            info!("Closed TTS worker");
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
