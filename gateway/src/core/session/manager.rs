//! Registry of active call sessions keyed by media connection.
//!
//! The manager picks the session variant from the configured
//! [`VoiceProcessingMode`] once per connection and hands the caller a
//! [`SessionGuard`] that removes the registry entry when dropped.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    BoxedCallSession, PipelineCallSession, RealtimeCallSession, SessionError, SessionResult,
    SessionSignal, SessionSignalReceiver, SessionSignalSender,
};
use crate::config::{ServerConfig, VoiceProcessingMode};
use crate::core::call::{
    CallControl, NoopCallControl, OutboundPromptBuilder, PromptBuilder, TwilioCallControl,
};
use crate::core::media::MediaTransport;
use crate::core::pipeline::{
    ChatService, OpenAiCompatibleChat, SpeechToText, SubprocessStt, SubprocessTts, TextToSpeech,
};
use crate::core::realtime::{BoxedRealtime, create_realtime_provider};

/// Builds the backend collaborators of a new session.
pub trait BackendFactory: Send + Sync {
    fn realtime(&self, config: &ServerConfig) -> SessionResult<BoxedRealtime>;

    fn speech_to_text(&self, config: &ServerConfig) -> SessionResult<Box<dyn SpeechToText>>;

    fn text_to_speech(&self, config: &ServerConfig) -> SessionResult<Box<dyn TextToSpeech>>;

    fn chat(&self, config: &ServerConfig) -> SessionResult<Arc<dyn ChatService>>;
}

/// Production backends: OpenAI Realtime, subprocess speech workers and an
/// OpenAI-compatible chat endpoint.
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn realtime(&self, config: &ServerConfig) -> SessionResult<BoxedRealtime> {
        Ok(create_realtime_provider(config.realtime_config())?)
    }

    fn speech_to_text(&self, config: &ServerConfig) -> SessionResult<Box<dyn SpeechToText>> {
        Ok(Box::new(SubprocessStt::new(
            config.pipeline.stt_command.clone(),
        )?))
    }

    fn text_to_speech(&self, config: &ServerConfig) -> SessionResult<Box<dyn TextToSpeech>> {
        Ok(Box::new(SubprocessTts::new(
            config.pipeline.tts_command.clone(),
        )?))
    }

    fn chat(&self, config: &ServerConfig) -> SessionResult<Arc<dyn ChatService>> {
        Ok(Arc::new(OpenAiCompatibleChat::new(config.chat_config())?))
    }
}

/// Registry record for one live session.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub mode: VoiceProcessingMode,
    pub started_at: Instant,
    signals: SessionSignalSender,
}

/// A freshly created session, ready for its driving task.
pub struct StartedSession {
    pub session: BoxedCallSession,
    pub signals: SessionSignalReceiver,
    pub guard: SessionGuard,
}

/// Removes the registry entry when the connection task ends.
pub struct SessionGuard {
    id: Uuid,
    sessions: Arc<DashMap<Uuid, SessionEntry>>,
}

impl SessionGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.sessions.remove(&self.id).is_some() {
            debug!("Session {} removed from registry", self.id);
        }
    }
}

#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<DashMap<Uuid, SessionEntry>>,
    config: Arc<ServerConfig>,
    call_control: Arc<dyn CallControl>,
    prompt_builder: Arc<dyn PromptBuilder>,
    factory: Arc<dyn BackendFactory>,
}

impl SessionManager {
    pub fn new(
        config: Arc<ServerConfig>,
        call_control: Arc<dyn CallControl>,
        prompt_builder: Arc<dyn PromptBuilder>,
        factory: Arc<dyn BackendFactory>,
    ) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            config,
            call_control,
            prompt_builder,
            factory,
        }
    }

    /// Wire the production collaborators for `config`.
    ///
    /// Falls back to a no-op call control when Twilio credentials are absent.
    pub fn from_config(config: Arc<ServerConfig>) -> Self {
        let call_control: Arc<dyn CallControl> = match (
            config.twilio.account_sid.as_deref(),
            config.twilio.auth_token.as_deref(),
        ) {
            (Some(sid), Some(token)) => {
                match TwilioCallControl::new(&config.twilio.api_base_url, sid, token) {
                    Ok(control) => Arc::new(control),
                    Err(e) => {
                        warn!("Twilio call control unavailable: {}", e);
                        Arc::new(NoopCallControl)
                    }
                }
            }
            _ => {
                info!("Twilio credentials not set, call control disabled");
                Arc::new(NoopCallControl)
            }
        };

        Self::new(
            config,
            call_control,
            Arc::new(OutboundPromptBuilder),
            Arc::new(DefaultBackendFactory),
        )
    }

    /// Create and register the session for a new media connection.
    pub fn create_session(
        &self,
        id: Uuid,
        transport: MediaTransport,
    ) -> SessionResult<StartedSession> {
        if self.sessions.contains_key(&id) {
            return Err(SessionError::AlreadyExists(id.to_string()));
        }
        if let Some(max) = self.config.max_websocket_connections
            && self.sessions.len() >= max
        {
            return Err(SessionError::LimitReached(self.sessions.len()));
        }

        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let mode = self.config.voice_processing_mode;
        let session = self.build_session(mode, transport, signals_tx.clone())?;

        match self.sessions.entry(id) {
            Entry::Occupied(_) => return Err(SessionError::AlreadyExists(id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(SessionEntry {
                    mode,
                    started_at: Instant::now(),
                    signals: signals_tx,
                });
            }
        }
        info!("Created {} session {}", mode, id);

        Ok(StartedSession {
            session,
            signals: signals_rx,
            guard: SessionGuard {
                id,
                sessions: self.sessions.clone(),
            },
        })
    }

    fn build_session(
        &self,
        mode: VoiceProcessingMode,
        transport: MediaTransport,
        signals: SessionSignalSender,
    ) -> SessionResult<BoxedCallSession> {
        let config = self.config.as_ref();
        Ok(match mode {
            VoiceProcessingMode::Realtime => Box::new(RealtimeCallSession::new(
                config,
                transport,
                self.factory.realtime(config)?,
                self.call_control.clone(),
                self.prompt_builder.clone(),
                signals,
            )),
            VoiceProcessingMode::Pipeline => Box::new(PipelineCallSession::new(
                config,
                transport,
                self.factory.speech_to_text(config)?,
                self.factory.text_to_speech(config)?,
                self.factory.chat(config)?,
                self.call_control.clone(),
                self.prompt_builder.clone(),
                signals,
            )),
        })
    }

    /// Drop a session from the registry. Returns false if it was not present.
    pub fn remove_session(&self, id: &Uuid) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Ask a running session to close its connections.
    pub fn terminate_session(&self, id: &Uuid) -> bool {
        match self.sessions.get(id) {
            Some(entry) => entry.signals.send(SessionSignal::Terminate).is_ok(),
            None => false,
        }
    }

    /// Ask every running session to close. Returns how many were signalled.
    pub fn terminate_all(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.signals.send(SessionSignal::Terminate).is_ok())
            .count()
    }

    pub fn get(&self, id: &Uuid) -> Option<SessionEntry> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn config(&self) -> &Arc<ServerConfig> {
        &self.config
    }
}
