//! HTTP surface and a live media stream over a real socket.

mod common;

use std::time::Duration;

use axum::body::Body;
use futures::{SinkExt, StreamExt};
use http::{Request, StatusCode};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

use voice_relay_gateway::core::realtime::{RealtimeEvent, ServerEvent};
use voice_relay_gateway::{AppState, routes};

use common::{AiCommand, RecordingAi, manager, test_config};

fn app(ai: RecordingAi) -> axum::Router {
    routes::create_app(AppState::with_sessions(manager(test_config(), ai)))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let response = app(RecordingAi::default())
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(body_json(response).await, json!({"status": "OK"}));
}

#[tokio::test]
async fn test_session_count_starts_at_zero() {
    let response = app(RecordingAi::default())
        .oneshot(Request::get("/sessions").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"active_sessions": 0}));
}

#[tokio::test]
async fn test_wrong_secret_is_unauthorized() {
    let response = app(RecordingAi::default())
        .oneshot(
            Request::get("/call/connection-outgoing/wrong-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_right_secret_without_upgrade_is_rejected_by_upgrade() {
    let response = app(RecordingAi::default())
        .oneshot(
            Request::get("/call/connection-outgoing/test-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_connection_cap_returns_service_unavailable() {
    let mut config = test_config();
    config.max_websocket_connections = Some(0);
    let app = routes::create_app(AppState::with_sessions(manager(
        config,
        RecordingAi::default(),
    )));

    let response = app
        .oneshot(
            Request::get("/call/connection-outgoing/test-secret")
                .header("connection", "upgrade")
                .header("upgrade", "websocket")
                .header("sec-websocket-version", "13")
                .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_live_call_round_trip() {
    let ai = RecordingAi::default();
    let sessions = manager(test_config(), ai.clone());
    let state = AppState::with_sessions(sessions.clone());
    let app = routes::create_app(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let url = format!("ws://{addr}/call/connection-outgoing/test-secret");
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    let start = json!({
        "event": "start",
        "start": {"streamSid": "MZ1", "callSid": "CA1", "customParameters": {}}
    });
    ws.send(Message::Text(start.to_string().into())).await.unwrap();
    let media = json!({"event": "media", "media": {"timestamp": "40", "payload": "dGVzdA=="}});
    ws.send(Message::Text(media.to_string().into())).await.unwrap();

    // Wait for the session to open the AI side and forward caller audio.
    tokio::time::timeout(Duration::from_secs(5), async {
        while !ai.commands().contains(&AiCommand::Audio("dGVzdA==".to_string())) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("caller audio reaches the AI backend");
    assert_eq!(sessions.active_count(), 1);

    let events = ai.events.lock().clone().expect("adapter initialized");
    events
        .send(RealtimeEvent::Message(ServerEvent::AudioDelta {
            item_id: Some("x1".to_string()),
            delta: "AAA".to_string(),
        }))
        .unwrap();

    let mut received = Vec::new();
    while received.len() < 2 {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("frame within timeout")
            .expect("socket open")
            .unwrap();
        if let Message::Text(text) = frame {
            received.push(serde_json::from_str::<Value>(text.as_str()).unwrap());
        }
    }
    assert_eq!(received[0]["event"], "media");
    assert_eq!(received[0]["streamSid"], "MZ1");
    assert_eq!(received[0]["media"]["payload"], "AAA");
    assert_eq!(received[1]["event"], "mark");
    assert_eq!(received[1]["mark"]["name"], "responsePart");

    ws.close(None).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while sessions.active_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session is released after the call");
    assert!(ai.commands().contains(&AiCommand::Close));
}
