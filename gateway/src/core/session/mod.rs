//! Call sessions: the state machine between a media stream and an AI backend.
//!
//! A session is driven by exactly one task. That task feeds it inbound media
//! events and [`SessionSignal`]s, so a session's [`CallState`] is never
//! touched concurrently and needs no lock.

pub mod barge_in;
mod common;
pub mod manager;
pub mod pipeline;
pub mod realtime;
#[cfg(test)]
pub(crate) mod testing;
pub mod timer;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::core::call::CallState;
use crate::core::media::MediaEvent;
use crate::core::pipeline::{PipelineError, PipelineEvent, PipelineResult};
use crate::core::realtime::{RealtimeError, RealtimeEvent};

pub use barge_in::{TruncationPlan, plan_truncation};
pub use manager::{
    BackendFactory, DefaultBackendFactory, SessionEntry, SessionGuard, SessionManager,
    StartedSession,
};
pub use pipeline::PipelineCallSession;
pub use realtime::RealtimeCallSession;
pub use timer::DeferredTimers;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session already exists for connection {0}")]
    AlreadyExists(String),

    #[error("Session limit reached ({0} active)")]
    LimitReached(usize),

    #[error("Realtime backend error: {0}")]
    Realtime(#[from] RealtimeError),

    #[error("Pipeline backend error: {0}")]
    Pipeline(#[from] PipelineError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Work scheduled to run on the session task after a delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredAction {
    /// Send the AI session configuration once the handshake has settled.
    ConfigureSession,
    /// Hang up after a goodbye.
    EndCall,
    /// Close every connection of the session.
    CloseConnections,
}

/// Anything other than a media frame that a session reacts to.
#[derive(Debug)]
pub enum SessionSignal {
    Realtime(RealtimeEvent),
    Pipeline(PipelineEvent),
    ChatReply(PipelineResult<String>),
    Deferred(DeferredAction),
    /// External request to end the session now.
    Terminate,
}

pub type SessionSignalSender = mpsc::UnboundedSender<SessionSignal>;
pub type SessionSignalReceiver = mpsc::UnboundedReceiver<SessionSignal>;

/// One phone call bridged to an AI backend.
///
/// The variant is chosen once when the session is created.
#[async_trait]
pub trait CallSession: Send {
    /// Open backend connections. Called once before any event.
    async fn initialize(&mut self) -> SessionResult<()>;

    async fn handle_transport_event(&mut self, event: MediaEvent);

    async fn handle_signal(&mut self, signal: SessionSignal);

    /// Close all connections and cancel pending timers. Idempotent.
    async fn terminate(&mut self);

    /// True once the media side is closed and the task should stop.
    fn is_finished(&self) -> bool;

    fn call_state(&self) -> &CallState;
}

pub type BoxedCallSession = Box<dyn CallSession>;

/// Relay every event from `rx` into the session channel.
pub(crate) fn forward_events<T, F>(
    mut rx: mpsc::UnboundedReceiver<T>,
    signals: SessionSignalSender,
    wrap: F,
) where
    T: Send + 'static,
    F: Fn(T) -> SessionSignal + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if signals.send(wrap(event)).is_err() {
                break;
            }
        }
    });
}
