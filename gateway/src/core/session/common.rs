//! Media-side handling shared by both session variants.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::core::call::{
    CallControl, CallState, PromptBuilder, spawn_end_call, spawn_start_recording,
};
use crate::core::media::{MarkPayload, MediaPayload, MediaTransport, StartPayload};

/// The telephony leg of a call: its state, the outbound transport and the
/// call-control handle.
pub(super) struct CallLeg {
    pub state: CallState,
    pub transport: MediaTransport,
    call_control: Arc<dyn CallControl>,
    prompt_builder: Arc<dyn PromptBuilder>,
    initial_message: String,
    record_calls: bool,
}

impl CallLeg {
    pub fn new(
        config: &ServerConfig,
        transport: MediaTransport,
        call_control: Arc<dyn CallControl>,
        prompt_builder: Arc<dyn PromptBuilder>,
    ) -> Self {
        Self {
            state: CallState::new(config.call.call_type),
            transport,
            call_control,
            prompt_builder,
            initial_message: config.call.initial_message.clone(),
            record_calls: config.call.record_calls,
        }
    }

    pub fn on_start(&mut self, start: StartPayload) {
        info!("Incoming stream has started {}", start.stream_sid);

        self.transport.set_stream_sid(start.stream_sid.clone());
        self.state.begin_stream(start.stream_sid, start.call_sid);

        let params = start.custom_parameters;
        self.state
            .set_parties(&params.from_number, &params.to_number);

        let context = self
            .prompt_builder
            .build_context(&self.state, params.call_context.as_deref());
        self.state.seed_conversation(context, &self.initial_message);
    }

    pub fn on_media(&mut self, media: &MediaPayload) {
        self.state.latest_media_timestamp = media.timestamp;

        if self.state.has_seen_media {
            return;
        }
        self.state.has_seen_media = true;

        if !self.record_calls {
            return;
        }
        match self.state.call_id.clone() {
            Some(call_id) => spawn_start_recording(self.call_control.clone(), call_id),
            None => warn!("Recording requested but the stream carried no call id"),
        }
    }

    pub fn on_mark(&mut self, mark: MarkPayload) {
        if self.state.acknowledge_mark().is_none() {
            debug!("Mark {:?} acknowledged with an empty queue", mark.name);
        }
    }

    /// Hang up on the telephony side if the call id is known.
    pub fn end_call(&self) {
        match self.state.call_id.clone() {
            Some(call_id) => spawn_end_call(self.call_control.clone(), call_id),
            None => warn!("Cannot end call: no call id known"),
        }
    }
}
