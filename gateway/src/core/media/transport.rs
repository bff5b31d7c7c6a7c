//! Outbound side of the telephony media stream.
//!
//! [`MediaTransport`] does not own the socket. It pushes serialized frames
//! into a channel drained by the connection's sender task, which keeps every
//! send fire-and-forget from the session's point of view.

use std::collections::VecDeque;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::messages::{OutboundMark, OutboundMedia, OutboundMessage, RESPONSE_MARK_NAME};

/// Message routed to the media connection's sender task.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaRoute {
    /// A JSON text frame.
    Frame(String),
    /// Close the connection.
    Close,
}

pub struct MediaTransport {
    outbound: mpsc::Sender<MediaRoute>,
    stream_sid: Option<String>,
    closed: bool,
}

impl MediaTransport {
    pub fn new(outbound: mpsc::Sender<MediaRoute>) -> Self {
        Self {
            outbound,
            stream_sid: None,
            closed: false,
        }
    }

    /// Bind the transport to the stream announced by the `start` event.
    pub fn set_stream_sid(&mut self, stream_sid: impl Into<String>) {
        self.stream_sid = Some(stream_sid.into());
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Play an audio chunk to the caller.
    pub async fn send_audio(&self, payload: &str) {
        let Some(stream_sid) = self.active_stream() else {
            return;
        };
        let message = OutboundMessage::Media {
            stream_sid: stream_sid.to_string(),
            media: OutboundMedia {
                payload: payload.to_string(),
            },
        };
        self.send(message).await;
    }

    /// Send a playback mark and record it as pending.
    pub async fn send_mark(&self, mark_queue: &mut VecDeque<String>) {
        let Some(stream_sid) = self.active_stream() else {
            return;
        };
        let message = OutboundMessage::Mark {
            stream_sid: stream_sid.to_string(),
            mark: OutboundMark {
                name: RESPONSE_MARK_NAME.to_string(),
            },
        };
        self.send(message).await;
        mark_queue.push_back(RESPONSE_MARK_NAME.to_string());
    }

    /// Ask the remote player to drop buffered audio it has not played yet.
    pub async fn clear_stream(&self) {
        let Some(stream_sid) = self.active_stream() else {
            return;
        };
        let message = OutboundMessage::Clear {
            stream_sid: stream_sid.to_string(),
        };
        self.send(message).await;
    }

    /// Close the media connection. Safe to call repeatedly.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.outbound.send(MediaRoute::Close).await.is_err() {
            debug!("Media sender already stopped while closing");
        }
    }

    fn active_stream(&self) -> Option<&str> {
        if self.closed {
            return None;
        }
        self.stream_sid.as_deref()
    }

    async fn send(&self, message: OutboundMessage) {
        match message.to_json() {
            Ok(json) => {
                if self.outbound.send(MediaRoute::Frame(json)).await.is_err() {
                    debug!("Media sender stopped, dropping outbound frame");
                }
            }
            Err(e) => warn!("Failed to serialize media frame: {}", e),
        }
    }
}
