//! Media stream WebSocket route configuration

use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::call_stream_handler;
use crate::middleware::connection_limit_middleware;
use crate::state::AppState;
use std::sync::Arc;

/// Create the media stream WebSocket router
///
/// # Endpoint
///
/// `GET /call/connection-outgoing/{secret}` - WebSocket upgrade for one phone call
///
/// # Protocol
///
/// The telephony provider sends JSON text frames: `start` once, then `media`
/// frames with base64 u-law audio and `mark` acknowledgements. The server
/// answers with `media`, `mark` and `clear` frames for the same stream.
pub fn create_call_stream_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/call/connection-outgoing/{secret}", get(call_stream_handler))
        .layer(middleware::from_fn_with_state(
            state,
            connection_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}
