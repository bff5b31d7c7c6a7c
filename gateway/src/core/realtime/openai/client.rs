//! OpenAI Realtime API client.
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//! - Audio: G.711 u-law passthrough from the telephony stream, base64 encoded
//!
//! The connection lives in a spawned task. Commands reach it through an mpsc
//! channel and inbound traffic is reported as [`RealtimeEvent`]s.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use http::HeaderValue;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tracing::{debug, error, info, warn};
use url::Url;

use super::config::{AudioFormat, LOG_EVENT_TYPES, Modality};
use super::messages::{ClientEvent, InputAudioTranscription, ServerEvent, SessionConfig, TurnDetection};
use crate::core::realtime::base::{
    BaseRealtime, ConnectionState, RealtimeConfig, RealtimeError, RealtimeEvent,
    RealtimeEventSender, RealtimeResult,
};

/// Channel capacity for WebSocket message sending.
const WS_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// OpenAI Realtime Client
// =============================================================================

/// OpenAI Realtime API client.
///
/// The `connected` flag is shared with the connection task so that
/// [`BaseRealtime::is_connected`] reflects the live socket.
pub struct OpenAIRealtime {
    config: RealtimeConfig,
    connected: Arc<AtomicBool>,
    closing: Arc<AtomicBool>,
    state: Arc<RwLock<ConnectionState>>,
    ws_sender: Arc<Mutex<Option<mpsc::Sender<ClientEvent>>>>,
    connection_handle: Option<JoinHandle<()>>,
    session_configured: bool,
}

impl OpenAIRealtime {
    pub fn new(config: RealtimeConfig) -> RealtimeResult<Self> {
        if config.api_key.is_empty() {
            return Err(RealtimeError::InvalidConfiguration(
                "OpenAI API key is required".to_string(),
            ));
        }
        if AudioFormat::parse(&config.audio_format).is_none() {
            return Err(RealtimeError::InvalidConfiguration(format!(
                "Unsupported audio format: {}",
                config.audio_format
            )));
        }

        Ok(Self {
            config,
            connected: Arc::new(AtomicBool::new(false)),
            closing: Arc::new(AtomicBool::new(false)),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            ws_sender: Arc::new(Mutex::new(None)),
            connection_handle: None,
            session_configured: false,
        })
    }

    /// Endpoint URL with the model query parameter.
    pub fn build_ws_url(&self) -> RealtimeResult<Url> {
        let mut url = Url::parse(&self.config.url).map_err(|e| {
            RealtimeError::InvalidConfiguration(format!("Invalid realtime URL: {e}"))
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(RealtimeError::InvalidConfiguration(format!(
                "Realtime URL must use ws:// or wss://, got {}",
                url.scheme()
            )));
        }
        let has_model = url.query_pairs().any(|(k, _)| k == "model");
        if !has_model && !self.config.model.is_empty() {
            url.query_pairs_mut().append_pair("model", &self.config.model);
        }
        Ok(url)
    }

    /// The `session.update` payload for a phone call.
    pub fn build_session_config(&self, instructions: &str) -> SessionConfig {
        let format = AudioFormat::parse(&self.config.audio_format).unwrap_or_default();
        SessionConfig {
            turn_detection: Some(TurnDetection::server_vad()),
            input_audio_format: Some(format),
            output_audio_format: Some(format),
            voice: Some(self.config.voice.clone()),
            instructions: Some(instructions.to_string()),
            modalities: Some(vec![Modality::Text, Modality::Audio]),
            temperature: Some(self.config.temperature),
            input_audio_transcription: self
                .config
                .transcription_model
                .as_ref()
                .map(|model| InputAudioTranscription {
                    model: model.clone(),
                }),
        }
    }

    fn build_request(&self) -> RealtimeResult<http::Request<()>> {
        let url = self.build_ws_url()?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;

        let auth = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|e| RealtimeError::InvalidConfiguration(format!("Invalid API key: {e}")))?;
        let headers = request.headers_mut();
        headers.insert(http::header::AUTHORIZATION, auth);
        headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        Ok(request)
    }

    /// Queue an event for the connection task. Dropped silently when closed.
    async fn send_event(&self, event: ClientEvent) -> RealtimeResult<()> {
        if !self.connected.load(Ordering::SeqCst) {
            debug!("Realtime not connected, skipping {}", event.event_type());
            return Ok(());
        }

        let sender = self.ws_sender.lock().await.clone();
        match sender {
            Some(tx) => {
                if tx.send(event).await.is_err() {
                    debug!("Realtime connection task has stopped");
                }
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Parse an inbound text frame, logging interesting event types.
fn parse_server_event(text: &str) -> Option<ServerEvent> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            warn!("Failed to parse realtime message: {}", e);
            return None;
        }
    };

    let event_type = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if LOG_EVENT_TYPES.contains(&event_type) {
        info!("Received realtime event: {}", event_type);
    } else {
        debug!("Received realtime event: {}", event_type);
    }

    match serde_json::from_value::<ServerEvent>(value) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Failed to decode realtime event: {}", e);
            None
        }
    }
}

#[async_trait]
impl BaseRealtime for OpenAIRealtime {
    async fn initialize(&mut self, events: RealtimeEventSender) -> RealtimeResult<()> {
        if self.connection_handle.is_some() {
            return Ok(());
        }

        let request = self.build_request()?;
        *self.state.write() = ConnectionState::Connecting;

        let connected = self.connected.clone();
        let closing = self.closing.clone();
        let state = self.state.clone();
        let ws_sender = self.ws_sender.clone();

        let handle = tokio::spawn(async move {
            let ws_stream = match tokio_tungstenite::connect_async(request).await {
                Ok((ws_stream, _response)) => ws_stream,
                Err(e) => {
                    error!("Failed to connect to OpenAI Realtime API: {}", e);
                    *state.write() = ConnectionState::Failed;
                    let _ = events.send(RealtimeEvent::Error(e.to_string()));
                    let _ = events.send(RealtimeEvent::Closed {
                        reason: Some("connection failed".to_string()),
                    });
                    return;
                }
            };

            let (mut ws_sink, mut ws_stream) = ws_stream.split();
            let (tx, mut rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);

            {
                let mut sender = ws_sender.lock().await;
                if closing.load(Ordering::SeqCst) {
                    debug!("Realtime session closed during handshake");
                    let _ = ws_sink.close().await;
                    *state.write() = ConnectionState::Closed;
                    return;
                }
                *sender = Some(tx);
                connected.store(true, Ordering::SeqCst);
                *state.write() = ConnectionState::Connected;
            }

            info!("Connected to OpenAI Realtime API");
            let _ = events.send(RealtimeEvent::Opened);

            let mut reason = None;
            loop {
                tokio::select! {
                    outgoing = rx.recv() => {
                        let Some(event) = outgoing else {
                            // Every sender dropped: local close.
                            let _ = ws_sink.close().await;
                            break;
                        };
                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(e) => {
                                error!("Failed to serialize event: {}", e);
                                continue;
                            }
                        };
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            error!("Failed to send WebSocket message: {}", e);
                            let _ = events.send(RealtimeEvent::Error(e.to_string()));
                            break;
                        }
                    }

                    incoming = ws_stream.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                if let Some(event) = parse_server_event(&text) {
                                    if events.send(RealtimeEvent::Message(event)).is_err() {
                                        debug!("Realtime event receiver dropped");
                                        break;
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    error!("Failed to send pong: {}", e);
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                info!("OpenAI Realtime WebSocket closed by server");
                                reason = frame.map(|f| f.reason.as_str().to_string());
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                error!("WebSocket error: {}", e);
                                let _ = events.send(RealtimeEvent::Error(e.to_string()));
                                break;
                            }
                            None => break,
                        }
                    }
                }
            }

            connected.store(false, Ordering::SeqCst);
            ws_sender.lock().await.take();
            *state.write() = ConnectionState::Closed;
            let _ = events.send(RealtimeEvent::Closed { reason });
        });

        self.connection_handle = Some(handle);
        Ok(())
    }

    async fn initialize_session(&mut self, instructions: &str) -> RealtimeResult<()> {
        if !self.is_connected() {
            debug!("Realtime not connected, deferring session configuration");
            return Ok(());
        }
        if self.session_configured {
            debug!("Realtime session already configured");
            return Ok(());
        }

        let session = self.build_session_config(instructions);
        self.send_event(ClientEvent::SessionUpdate { session }).await?;
        self.session_configured = true;
        info!("Sent realtime session configuration");
        Ok(())
    }

    async fn send_audio(&mut self, payload: &str) -> RealtimeResult<()> {
        self.send_event(ClientEvent::InputAudioBufferAppend {
            audio: payload.to_string(),
        })
        .await
    }

    async fn truncate_assistant_response(
        &mut self,
        item_id: &str,
        elapsed_ms: u64,
    ) -> RealtimeResult<()> {
        self.send_event(ClientEvent::ConversationItemTruncate {
            item_id: item_id.to_string(),
            content_index: 0,
            audio_end_ms: elapsed_ms,
        })
        .await
    }

    async fn close(&mut self) -> RealtimeResult<()> {
        if self.closing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Dropping the sender makes the connection task close the socket.
        self.ws_sender.lock().await.take();

        if !self.connected.load(Ordering::SeqCst) {
            if let Some(handle) = self.connection_handle.take() {
                handle.abort();
            }
            *self.state.write() = ConnectionState::Closed;
        }
        self.connected.store(false, Ordering::SeqCst);
        info!("Closed OpenAI Realtime session");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connection_state(&self) -> ConnectionState {
        *self.state.read()
    }
}
