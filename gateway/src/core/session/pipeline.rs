//! Call session backed by separate STT, chat and TTS collaborators.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::common::CallLeg;
use super::timer::DeferredTimers;
use super::{
    CallSession, DeferredAction, SessionResult, SessionSignal, SessionSignalSender,
    forward_events,
};
use crate::config::ServerConfig;
use crate::core::call::{CallControl, CallState, GoodbyeDetector, PromptBuilder, Role};
use crate::core::media::{MediaEvent, MediaTransport};
use crate::core::pipeline::{ChatService, PipelineEvent, SpeechToText, TextToSpeech};

pub struct PipelineCallSession {
    leg: CallLeg,
    stt: Box<dyn SpeechToText>,
    tts: Box<dyn TextToSpeech>,
    chat: Arc<dyn ChatService>,
    goodbye: GoodbyeDetector,
    signals: SessionSignalSender,
    timers: DeferredTimers,

    goodbye_message: String,
    end_call_delay: Duration,
    close_delay: Duration,

    processing: bool,
    ending: bool,
    closed: bool,
}

impl PipelineCallSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &ServerConfig,
        transport: MediaTransport,
        stt: Box<dyn SpeechToText>,
        tts: Box<dyn TextToSpeech>,
        chat: Arc<dyn ChatService>,
        call_control: Arc<dyn CallControl>,
        prompt_builder: Arc<dyn PromptBuilder>,
        signals: SessionSignalSender,
    ) -> Self {
        Self {
            leg: CallLeg::new(config, transport, call_control, prompt_builder),
            stt,
            tts,
            chat,
            goodbye: GoodbyeDetector::new(config.call.goodbye_phrases.iter()),
            timers: DeferredTimers::new(signals.clone()),
            signals,
            goodbye_message: config.pipeline.goodbye_message.clone(),
            end_call_delay: Duration::from_millis(config.pipeline.end_call_delay_ms),
            close_delay: Duration::from_millis(config.pipeline.close_delay_ms),
            processing: false,
            ending: false,
            closed: false,
        }
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    async fn handle_pipeline_event(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::Transcription(text) => self.handle_transcription(text).await,
            PipelineEvent::SynthesizedAudio { payload, .. } => {
                self.leg.transport.send_audio(&payload).await;
                self.leg
                    .transport
                    .send_mark(&mut self.leg.state.mark_queue)
                    .await;
            }
            PipelineEvent::WorkerExited { worker } => {
                warn!("Pipeline {} worker exited", worker);
            }
        }
    }

    async fn handle_transcription(&mut self, text: String) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if self.processing || self.ending {
            debug!("Reply in progress, dropping transcription: {}", text);
            return;
        }

        info!("Caller said: {}", text);
        self.leg.state.push_message(Role::User, text);

        if self.goodbye.is_goodbye(text) {
            self.ending = true;
            let message = self.goodbye_message.clone();
            self.speak(&message).await;
            info!(
                "Goodbye detected, ending call in {}ms",
                self.end_call_delay.as_millis()
            );
            self.timers
                .schedule(self.end_call_delay, DeferredAction::EndCall);
            return;
        }

        self.processing = true;
        let chat = self.chat.clone();
        let history = self.leg.state.conversation_history().to_vec();
        let signals = self.signals.clone();
        tokio::spawn(async move {
            let reply = chat.generate_response(&history).await;
            if signals.send(SessionSignal::ChatReply(reply)).is_err() {
                debug!("Session ended before the chat reply arrived");
            }
        });
    }

    /// Append an assistant line to the transcript and synthesize it.
    async fn speak(&mut self, text: &str) {
        if !self.leg.state.push_message(Role::Assistant, text) {
            return;
        }
        info!("Assistant says: {}", text);
        if let Err(e) = self.tts.synthesize(text).await {
            error!("Failed to synthesize reply: {}", e);
        }
    }

    async fn close_connections(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.leg.transport.close().await;
        self.stt.close().await;
        self.tts.close().await;
    }
}

#[async_trait]
impl CallSession for PipelineCallSession {
    async fn initialize(&mut self) -> SessionResult<()> {
        let (stt_tx, stt_rx) = mpsc::unbounded_channel();
        self.stt.start(stt_tx).await?;
        forward_events(stt_rx, self.signals.clone(), SessionSignal::Pipeline);

        let (tts_tx, tts_rx) = mpsc::unbounded_channel();
        self.tts.start(tts_tx).await?;
        forward_events(tts_rx, self.signals.clone(), SessionSignal::Pipeline);
        Ok(())
    }

    async fn handle_transport_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::Start(start) => self.leg.on_start(start),
            MediaEvent::Media(media) => {
                self.leg.on_media(&media);
                if let Err(e) = self.stt.process_audio(&media.payload).await {
                    warn!("Failed to forward caller audio to STT: {}", e);
                }
            }
            MediaEvent::Mark(mark) => self.leg.on_mark(mark),
            MediaEvent::Other { event } => debug!("Received non-media event: {}", event),
        }
    }

    async fn handle_signal(&mut self, signal: SessionSignal) {
        match signal {
            SessionSignal::Pipeline(event) => self.handle_pipeline_event(event).await,
            SessionSignal::ChatReply(reply) => {
                self.processing = false;
                match reply {
                    Ok(text) => {
                        let text = text.trim().to_string();
                        if text.is_empty() {
                            warn!("Chat model returned an empty reply");
                        } else {
                            self.speak(&text).await;
                        }
                    }
                    Err(e) => error!("Failed to generate reply: {}", e),
                }
            }
            SessionSignal::Deferred(DeferredAction::EndCall) => {
                self.leg.end_call();
                self.timers
                    .schedule(self.close_delay, DeferredAction::CloseConnections);
            }
            SessionSignal::Deferred(DeferredAction::CloseConnections) => {
                self.close_connections().await;
            }
            SessionSignal::Terminate => self.terminate().await,
            other => debug!("Pipeline session ignoring signal {:?}", other),
        }
    }

    async fn terminate(&mut self) {
        self.timers.cancel_all();
        self.close_connections().await;
    }

    fn is_finished(&self) -> bool {
        self.closed || self.leg.transport.is_closed()
    }

    fn call_state(&self) -> &CallState {
        &self.leg.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::call::{NoopCallControl, OutboundPromptBuilder};
    use crate::core::media::{MediaRoute, StartPayload};
    use crate::core::session::testing::{FakeChat, FakeSpeech};

    struct Harness {
        session: PipelineCallSession,
        out: mpsc::Receiver<MediaRoute>,
        signals: super::super::SessionSignalReceiver,
        speech: FakeSpeech,
    }

    fn harness(reply: &str) -> Harness {
        let config = ServerConfig::default();
        let (out_tx, out) = mpsc::channel(64);
        let (sig_tx, signals) = mpsc::unbounded_channel();
        let speech = FakeSpeech::default();
        let session = PipelineCallSession::new(
            &config,
            MediaTransport::new(out_tx),
            Box::new(speech.clone()),
            Box::new(speech.clone()),
            Arc::new(FakeChat::new(reply)),
            Arc::new(NoopCallControl),
            Arc::new(OutboundPromptBuilder),
            sig_tx,
        );
        Harness {
            session,
            out,
            signals,
            speech,
        }
    }

    async fn start(h: &mut Harness) {
        h.session
            .handle_transport_event(MediaEvent::Start(StartPayload {
                stream_sid: "MZ1".to_string(),
                call_sid: Some("CA1".to_string()),
                custom_parameters: Default::default(),
            }))
            .await;
    }

    fn transcription(text: &str) -> SessionSignal {
        SessionSignal::Pipeline(PipelineEvent::Transcription(text.to_string()))
    }

    #[tokio::test]
    async fn test_transcription_round_trip_through_chat() {
        let mut h = harness("Sure, I can help.");
        start(&mut h).await;

        h.session.handle_signal(transcription("I need help")).await;
        assert!(h.session.is_processing());

        // A second utterance while the reply is pending is dropped.
        h.session.handle_signal(transcription("hello?")).await;

        let reply = h.signals.recv().await.expect("chat reply");
        assert!(matches!(reply, SessionSignal::ChatReply(Ok(_))));
        h.session.handle_signal(reply).await;

        assert!(!h.session.is_processing());
        let history = h.session.call_state().conversation_history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[2].content, "I need help");
        assert_eq!(history[3].role, Role::Assistant);
        assert_eq!(h.speech.synthesized(), vec!["Sure, I can help.".to_string()]);
    }

    #[tokio::test]
    async fn test_synthesized_audio_is_played_with_mark() {
        let mut h = harness("");
        start(&mut h).await;

        h.session
            .handle_signal(SessionSignal::Pipeline(PipelineEvent::SynthesizedAudio {
                payload: "AAA".to_string(),
                sample_rate: Some(8000),
            }))
            .await;

        let Some(MediaRoute::Frame(media)) = h.out.recv().await else {
            panic!("expected media frame");
        };
        assert!(media.contains("AAA"));
        let Some(MediaRoute::Frame(mark)) = h.out.recv().await else {
            panic!("expected mark frame");
        };
        assert!(mark.contains("responsePart"));
        assert_eq!(h.session.call_state().mark_queue.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_goodbye_speaks_then_closes() {
        let mut h = harness("unused");
        start(&mut h).await;

        h.session.handle_signal(transcription("OK, goodbye")).await;
        assert_eq!(
            h.speech.synthesized(),
            vec![ServerConfig::default().pipeline.goodbye_message.clone()]
        );

        let end = h.signals.recv().await.expect("end call");
        assert!(matches!(
            end,
            SessionSignal::Deferred(DeferredAction::EndCall)
        ));
        h.session.handle_signal(end).await;
        assert!(!h.session.is_finished());

        let close = h.signals.recv().await.expect("close");
        h.session.handle_signal(close).await;
        assert!(h.session.is_finished());
        assert!(h.speech.closed());
    }

    #[tokio::test]
    async fn test_media_reaches_stt() {
        let mut h = harness("");
        start(&mut h).await;
        h.session
            .handle_transport_event(MediaEvent::Media(crate::core::media::MediaPayload {
                timestamp: 20,
                payload: "AQID".to_string(),
            }))
            .await;
        assert_eq!(h.speech.audio(), vec!["AQID".to_string()]);
        assert_eq!(h.session.call_state().latest_media_timestamp, 20);
    }
}
