//! Telephony media stream WebSocket handler
//!
//! One connection carries one phone call. The handler registers a call
//! session, then drives it from a single task: inbound frames and session
//! signals are consumed in one `select!` loop, while outbound frames go
//! through a channel to a dedicated sender task.

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::{select, time::Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::media::{MediaEvent, MediaRoute, MediaTransport};
use crate::core::session::StartedSession;
use crate::state::AppState;

/// Channel buffer for outbound media frames
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// How long to wait for the close frame to flush
const SENDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Compare secrets without short-circuiting on the first differing byte.
fn secrets_match(provided: &str, expected: &str) -> bool {
    let (a, b) = (provided.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Media stream WebSocket handler
///
/// Rejects a wrong path secret with 401 before any upgrade happens.
///
/// # Endpoint
///
/// `GET /call/connection-outgoing/{secret}`
pub async fn call_stream_handler(
    Path(secret): Path<String>,
    State(state): State<Arc<AppState>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if !secrets_match(&secret, &state.config.stream_secret) {
        warn!("Rejecting media stream connection: invalid stream secret");
        return (StatusCode::UNAUTHORIZED, "Invalid stream secret").into_response();
    }

    match ws {
        Ok(ws) => ws
            .max_frame_size(MAX_WS_FRAME_SIZE)
            .max_message_size(MAX_WS_MESSAGE_SIZE)
            .on_upgrade(move |socket| handle_call_stream(socket, state)),
        Err(rejection) => rejection.into_response(),
    }
}

/// Drive one media connection until either side closes it.
async fn handle_call_stream(socket: WebSocket, app_state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    info!(%connection_id, "Media stream connected");

    let (mut sender, mut receiver) = socket.split();
    let (route_tx, mut route_rx) = mpsc::channel::<MediaRoute>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing frames
    let sender_task = tokio::spawn(async move {
        while let Some(route) = route_rx.recv().await {
            let should_close = matches!(route, MediaRoute::Close);

            let result = match route {
                MediaRoute::Frame(json) => sender.send(Message::Text(json.into())).await,
                MediaRoute::Close => {
                    debug!("Closing media stream connection");
                    sender.send(Message::Close(None)).await
                }
            };

            if let Err(e) = result {
                debug!("Failed to send media frame: {}", e);
                break;
            }

            if should_close {
                break;
            }
        }
    });

    let transport = MediaTransport::new(route_tx);
    let StartedSession {
        mut session,
        mut signals,
        guard,
    } = match app_state.sessions.create_session(connection_id, transport) {
        Ok(started) => started,
        Err(e) => {
            error!(%connection_id, "Failed to create call session: {}", e);
            sender_task.abort();
            return;
        }
    };

    if let Err(e) = session.initialize().await {
        error!(%connection_id, "Failed to initialize call session: {}", e);
        session.terminate().await;
    }

    while !session.is_finished() {
        select! {
            msg_result = receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => match MediaEvent::parse(text.as_str()) {
                        Ok(event) => session.handle_transport_event(event).await,
                        Err(e) => warn!(%connection_id, "Dropping media frame: {}", e),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        info!(%connection_id, "Media stream closed by client");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(%connection_id, "Media stream error: {}", e);
                        break;
                    }
                }
            }
            Some(signal) = signals.recv() => {
                session.handle_signal(signal).await;
            }
        }
    }

    session.terminate().await;
    drop(guard);

    if tokio::time::timeout(SENDER_DRAIN_TIMEOUT, sender_task)
        .await
        .is_err()
    {
        debug!(%connection_id, "Media sender did not finish in time");
    }
    info!(%connection_id, "Media stream session ended");
}
