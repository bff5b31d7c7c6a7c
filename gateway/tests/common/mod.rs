//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use voice_relay_gateway::config::ServerConfig;
use voice_relay_gateway::core::call::{NoopCallControl, OutboundPromptBuilder};
use voice_relay_gateway::core::media::{MediaRoute, MediaTransport};
use voice_relay_gateway::core::pipeline::{ChatService, SpeechToText, TextToSpeech};
use voice_relay_gateway::core::realtime::{
    BaseRealtime, BoxedRealtime, ConnectionState, RealtimeEvent, RealtimeEventSender,
    RealtimeResult,
};
use voice_relay_gateway::core::session::{
    BackendFactory, SessionManager, SessionResult,
};
use voice_relay_gateway::core::pipeline::PipelineError;

/// A command the relay sent to the AI backend.
#[derive(Debug, Clone, PartialEq)]
pub enum AiCommand {
    Configure(String),
    Audio(String),
    Truncate { item_id: String, audio_end_ms: u64 },
    Close,
}

/// Realtime adapter that records commands and exposes its event sender.
#[derive(Clone, Default)]
pub struct RecordingAi {
    pub commands: Arc<Mutex<Vec<AiCommand>>>,
    pub events: Arc<Mutex<Option<RealtimeEventSender>>>,
}

impl RecordingAi {
    pub fn commands(&self) -> Vec<AiCommand> {
        self.commands.lock().clone()
    }

    pub fn truncations(&self) -> Vec<AiCommand> {
        self.commands()
            .into_iter()
            .filter(|c| matches!(c, AiCommand::Truncate { .. }))
            .collect()
    }
}

#[async_trait]
impl BaseRealtime for RecordingAi {
    async fn initialize(&mut self, events: RealtimeEventSender) -> RealtimeResult<()> {
        let _ = events.send(RealtimeEvent::Opened);
        *self.events.lock() = Some(events);
        Ok(())
    }

    async fn initialize_session(&mut self, instructions: &str) -> RealtimeResult<()> {
        self.commands
            .lock()
            .push(AiCommand::Configure(instructions.to_string()));
        Ok(())
    }

    async fn send_audio(&mut self, payload: &str) -> RealtimeResult<()> {
        self.commands
            .lock()
            .push(AiCommand::Audio(payload.to_string()));
        Ok(())
    }

    async fn truncate_assistant_response(
        &mut self,
        item_id: &str,
        audio_end_ms: u64,
    ) -> RealtimeResult<()> {
        self.commands.lock().push(AiCommand::Truncate {
            item_id: item_id.to_string(),
            audio_end_ms,
        });
        Ok(())
    }

    async fn close(&mut self) -> RealtimeResult<()> {
        self.commands.lock().push(AiCommand::Close);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn connection_state(&self) -> ConnectionState {
        ConnectionState::Connected
    }
}

/// Hands out clones of one recording adapter.
pub struct RecordingFactory {
    pub ai: RecordingAi,
}

impl BackendFactory for RecordingFactory {
    fn realtime(&self, _config: &ServerConfig) -> SessionResult<BoxedRealtime> {
        Ok(Box::new(self.ai.clone()))
    }

    fn speech_to_text(&self, _config: &ServerConfig) -> SessionResult<Box<dyn SpeechToText>> {
        Err(PipelineError::InvalidConfiguration("not used".to_string()).into())
    }

    fn text_to_speech(&self, _config: &ServerConfig) -> SessionResult<Box<dyn TextToSpeech>> {
        Err(PipelineError::InvalidConfiguration("not used".to_string()).into())
    }

    fn chat(&self, _config: &ServerConfig) -> SessionResult<Arc<dyn ChatService>> {
        Err(PipelineError::InvalidConfiguration("not used".to_string()).into())
    }
}

/// A realtime-mode config with no startup delays.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.openai_api_key = Some("sk-test".to_string());
    config.stream_secret = "test-secret".to_string();
    config.realtime.session_init_delay_ms = 0;
    config
}

pub fn manager(config: ServerConfig, ai: RecordingAi) -> SessionManager {
    SessionManager::new(
        Arc::new(config),
        Arc::new(NoopCallControl),
        Arc::new(OutboundPromptBuilder),
        Arc::new(RecordingFactory { ai }),
    )
}

pub fn transport() -> (MediaTransport, mpsc::Receiver<MediaRoute>) {
    let (tx, rx) = mpsc::channel(64);
    (MediaTransport::new(tx), rx)
}

/// Parse every frame queued on the transport channel.
pub fn drain_frames(rx: &mut mpsc::Receiver<MediaRoute>) -> Vec<serde_json::Value> {
    let mut frames = Vec::new();
    while let Ok(route) = rx.try_recv() {
        if let MediaRoute::Frame(json) = route {
            frames.push(serde_json::from_str(&json).expect("outbound frame is JSON"));
        }
    }
    frames
}
