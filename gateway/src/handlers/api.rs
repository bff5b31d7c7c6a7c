use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{Value, json};

use crate::state::AppState;

/// Health check handler
/// Returns a simple JSON response indicating the server is running
pub async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(json!({
        "status": "OK"
    })))
}

/// Number of call sessions currently registered.
pub async fn session_count(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "active_sessions": state.sessions.active_count()
    }))
}
