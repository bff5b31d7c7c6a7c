//! Call session bridged to a realtime speech-to-speech AI backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::common::CallLeg;
use super::timer::DeferredTimers;
use super::{
    CallSession, DeferredAction, SessionResult, SessionSignal, SessionSignalSender, barge_in,
    forward_events,
};
use crate::config::ServerConfig;
use crate::core::call::{CallControl, CallState, GoodbyeDetector, PromptBuilder, Role};
use crate::core::media::{MediaEvent, MediaTransport};
use crate::core::realtime::{BoxedRealtime, RealtimeEvent, ServerEvent};

pub struct RealtimeCallSession {
    leg: CallLeg,
    ai: BoxedRealtime,
    goodbye: GoodbyeDetector,
    signals: SessionSignalSender,
    timers: DeferredTimers,

    session_init_delay: Duration,
    end_call_delay: Duration,
    show_timing_math: bool,

    ai_open: bool,
    init_delay_elapsed: bool,
    session_configured: bool,
    end_call_pending: bool,
    finished: bool,
}

impl RealtimeCallSession {
    pub fn new(
        config: &ServerConfig,
        transport: MediaTransport,
        ai: BoxedRealtime,
        call_control: Arc<dyn CallControl>,
        prompt_builder: Arc<dyn PromptBuilder>,
        signals: SessionSignalSender,
    ) -> Self {
        Self {
            leg: CallLeg::new(config, transport, call_control, prompt_builder),
            ai,
            goodbye: GoodbyeDetector::new(config.call.goodbye_phrases.iter()),
            timers: DeferredTimers::new(signals.clone()),
            signals,
            session_init_delay: Duration::from_millis(config.realtime.session_init_delay_ms),
            end_call_delay: Duration::from_millis(config.call.end_call_delay_ms),
            show_timing_math: config.call.show_timing_math,
            ai_open: false,
            init_delay_elapsed: false,
            session_configured: false,
            end_call_pending: false,
            finished: false,
        }
    }

    /// Send the session configuration once the AI socket is open, the
    /// settle delay has passed and the stream context is known.
    async fn try_configure_session(&mut self) {
        if self.session_configured || !self.ai_open || !self.init_delay_elapsed {
            return;
        }
        if self.leg.state.stream_id.is_none() {
            debug!("Deferring session configuration until the stream starts");
            return;
        }

        self.session_configured = true;
        if let Err(e) = self.ai.initialize_session(&self.leg.state.call_context).await {
            error!("Failed to configure AI session: {}", e);
        }
    }

    async fn handle_ai_event(&mut self, event: RealtimeEvent) {
        match event {
            RealtimeEvent::Opened => {
                info!("Connected to the realtime AI backend");
                self.ai_open = true;
                self.timers
                    .schedule(self.session_init_delay, DeferredAction::ConfigureSession);
            }
            RealtimeEvent::Message(message) => self.handle_server_event(message).await,
            RealtimeEvent::Closed { reason } => {
                self.ai_open = false;
                info!(
                    "Disconnected from the realtime AI backend: {}",
                    reason.as_deref().unwrap_or("no reason")
                );
            }
            RealtimeEvent::Error(e) => {
                error!("Realtime AI connection error: {}", e);
            }
        }
    }

    async fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::InputAudioTranscriptionCompleted { transcript, .. } => {
                if !self.leg.state.push_message(Role::User, &transcript) {
                    return;
                }
                info!("Caller said: {}", transcript);
                if self.goodbye.is_goodbye(&transcript) {
                    self.schedule_end_call();
                }
            }
            ServerEvent::AudioTranscriptDone { transcript, .. } => {
                if self.leg.state.push_message(Role::Assistant, &transcript) {
                    info!("Assistant said: {}", transcript);
                }
            }
            ServerEvent::AudioDelta { item_id, delta } => {
                if delta.is_empty() {
                    return;
                }
                self.handle_audio_delta(item_id, &delta).await;
            }
            ServerEvent::SpeechStarted { .. } => {
                barge_in::handle_speech_started(
                    &mut self.leg.state,
                    self.ai.as_mut(),
                    &self.leg.transport,
                    self.show_timing_math,
                )
                .await;
            }
            ServerEvent::Error { error } => {
                error!(
                    "Realtime AI error: {}",
                    error.message.as_deref().unwrap_or("unknown error")
                );
            }
            _ => {}
        }
    }

    async fn handle_audio_delta(&mut self, item_id: Option<String>, delta: &str) {
        self.leg.transport.send_audio(delta).await;

        let state = &mut self.leg.state;
        if state.mark_response_start() && self.show_timing_math {
            info!(
                "Setting start timestamp for new response: {}ms",
                state.latest_media_timestamp
            );
        }
        if let Some(item_id) = item_id {
            state.last_assistant_item_id = Some(item_id);
        }

        self.leg.transport.send_mark(&mut state.mark_queue).await;
    }

    fn schedule_end_call(&mut self) {
        if self.end_call_pending {
            return;
        }
        self.end_call_pending = true;
        info!(
            "Goodbye detected, ending call in {}ms",
            self.end_call_delay.as_millis()
        );
        self.timers
            .schedule(self.end_call_delay, DeferredAction::EndCall);
    }

    async fn close_connections(&mut self) {
        self.leg.transport.close().await;
        if let Err(e) = self.ai.close().await {
            warn!("Error closing AI session: {}", e);
        }
        self.finished = true;
    }
}

#[async_trait]
impl CallSession for RealtimeCallSession {
    async fn initialize(&mut self) -> SessionResult<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.ai.initialize(tx).await?;
        forward_events(rx, self.signals.clone(), SessionSignal::Realtime);
        Ok(())
    }

    async fn handle_transport_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::Start(start) => {
                self.leg.on_start(start);
                self.try_configure_session().await;
            }
            MediaEvent::Media(media) => {
                self.leg.on_media(&media);
                if let Err(e) = self.ai.send_audio(&media.payload).await {
                    warn!("Failed to forward caller audio: {}", e);
                }
            }
            MediaEvent::Mark(mark) => self.leg.on_mark(mark),
            MediaEvent::Other { event } => debug!("Received non-media event: {}", event),
        }
    }

    async fn handle_signal(&mut self, signal: SessionSignal) {
        match signal {
            SessionSignal::Realtime(event) => self.handle_ai_event(event).await,
            SessionSignal::Deferred(DeferredAction::ConfigureSession) => {
                self.init_delay_elapsed = true;
                self.try_configure_session().await;
            }
            SessionSignal::Deferred(DeferredAction::EndCall)
            | SessionSignal::Deferred(DeferredAction::CloseConnections) => {
                self.leg.end_call();
                self.close_connections().await;
            }
            SessionSignal::Terminate => self.terminate().await,
            other => debug!("Realtime session ignoring signal {:?}", other),
        }
    }

    async fn terminate(&mut self) {
        self.timers.cancel_all();
        self.close_connections().await;
    }

    fn is_finished(&self) -> bool {
        self.finished || self.leg.transport.is_closed()
    }

    fn call_state(&self) -> &CallState {
        &self.leg.state
    }
}
