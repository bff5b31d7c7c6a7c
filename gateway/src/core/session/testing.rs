//! Recording fakes for session tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::call::ConversationMessage;
use crate::core::pipeline::{
    ChatService, PipelineEventSender, PipelineResult, SpeechToText, TextToSpeech,
};
use crate::core::realtime::{
    BaseRealtime, ConnectionState, RealtimeEvent, RealtimeEventSender, RealtimeResult,
};

#[derive(Default)]
struct Recorded {
    instructions: Vec<String>,
    audio: Vec<String>,
    truncations: Vec<(String, u64)>,
    closed: bool,
}

/// Read side of a [`FakeRealtime`].
#[derive(Clone, Default)]
pub struct FakeRealtimeLog(Arc<Mutex<Recorded>>);

impl FakeRealtimeLog {
    pub fn instructions(&self) -> Vec<String> {
        self.0.lock().instructions.clone()
    }

    pub fn audio(&self) -> Vec<String> {
        self.0.lock().audio.clone()
    }

    pub fn truncations(&self) -> Vec<(String, u64)> {
        self.0.lock().truncations.clone()
    }

    pub fn closed(&self) -> bool {
        self.0.lock().closed
    }
}

/// Realtime adapter that records every command and reports itself open.
pub struct FakeRealtime {
    log: FakeRealtimeLog,
    events: Option<RealtimeEventSender>,
}

impl FakeRealtime {
    pub fn new() -> (Self, FakeRealtimeLog) {
        let log = FakeRealtimeLog::default();
        (
            Self {
                log: log.clone(),
                events: None,
            },
            log,
        )
    }
}

#[async_trait]
impl BaseRealtime for FakeRealtime {
    async fn initialize(&mut self, events: RealtimeEventSender) -> RealtimeResult<()> {
        let _ = events.send(RealtimeEvent::Opened);
        self.events = Some(events);
        Ok(())
    }

    async fn initialize_session(&mut self, instructions: &str) -> RealtimeResult<()> {
        self.log.0.lock().instructions.push(instructions.to_string());
        Ok(())
    }

    async fn send_audio(&mut self, payload: &str) -> RealtimeResult<()> {
        self.log.0.lock().audio.push(payload.to_string());
        Ok(())
    }

    async fn truncate_assistant_response(
        &mut self,
        item_id: &str,
        audio_end_ms: u64,
    ) -> RealtimeResult<()> {
        self.log
            .0
            .lock()
            .truncations
            .push((item_id.to_string(), audio_end_ms));
        Ok(())
    }

    async fn close(&mut self) -> RealtimeResult<()> {
        self.log.0.lock().closed = true;
        self.events = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.log.closed()
    }

    fn connection_state(&self) -> ConnectionState {
        if self.log.closed() {
            ConnectionState::Closed
        } else {
            ConnectionState::Connected
        }
    }
}

#[derive(Default)]
struct SpeechRecorded {
    audio: Vec<String>,
    synthesized: Vec<String>,
    closed: bool,
}

/// Stands in for both speech workers. Clones share one log.
#[derive(Clone, Default)]
pub struct FakeSpeech(Arc<Mutex<SpeechRecorded>>);

impl FakeSpeech {
    pub fn audio(&self) -> Vec<String> {
        self.0.lock().audio.clone()
    }

    pub fn synthesized(&self) -> Vec<String> {
        self.0.lock().synthesized.clone()
    }

    pub fn closed(&self) -> bool {
        self.0.lock().closed
    }
}

#[async_trait]
impl SpeechToText for FakeSpeech {
    async fn start(&mut self, _events: PipelineEventSender) -> PipelineResult<()> {
        Ok(())
    }

    async fn process_audio(&mut self, payload: &str) -> PipelineResult<()> {
        self.0.lock().audio.push(payload.to_string());
        Ok(())
    }

    async fn close(&mut self) {
        self.0.lock().closed = true;
    }
}

#[async_trait]
impl TextToSpeech for FakeSpeech {
    async fn start(&mut self, _events: PipelineEventSender) -> PipelineResult<()> {
        Ok(())
    }

    async fn synthesize(&mut self, text: &str) -> PipelineResult<()> {
        self.0.lock().synthesized.push(text.to_string());
        Ok(())
    }

    async fn close(&mut self) {
        self.0.lock().closed = true;
    }
}

/// Chat service answering every request with the same text.
pub struct FakeChat {
    reply: String,
}

impl FakeChat {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
        }
    }
}

#[async_trait]
impl ChatService for FakeChat {
    async fn generate_response(&self, _history: &[ConversationMessage]) -> PipelineResult<String> {
        Ok(self.reply.clone())
    }
}
