//! Connection limit middleware for media stream WebSocket connections
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use voice_relay_gateway::middleware::connection_limit_middleware;
//!
//! let app = Router::new()
//!     .route("/ws", get(websocket_handler))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         connection_limit_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::state::AppState;

/// Middleware that enforces the global media connection cap.
///
/// Returns 503 Service Unavailable once `max_websocket_connections` sessions are
/// active. The middleware only applies to WebSocket upgrade requests (detected by
/// the Upgrade header). Other requests pass through without limit checks.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let is_ws_upgrade = request
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    if !is_ws_upgrade || !state.at_connection_capacity() {
        return next.run(request).await;
    }

    tracing::warn!(
        active = state.sessions.active_count(),
        "Rejecting connection: global limit reached"
    );
    (
        StatusCode::SERVICE_UNAVAILABLE,
        "Server at capacity. Please try again later.",
    )
        .into_response()
}
