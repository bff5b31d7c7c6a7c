//! Call-control collaborator: recording and hang-up on the telephony side.
//!
//! Sessions invoke these operations fire-and-forget through
//! [`spawn_start_recording`] and [`spawn_end_call`]; failures are logged and
//! never reach the session.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};

/// Default Twilio REST API base URL.
pub const TWILIO_API_BASE_URL: &str = "https://api.twilio.com";

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum CallControlError {
    #[error("Call control not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Telephony API error ({status}): {message}")]
    Api { status: u16, message: String },
}

pub type CallControlResult<T> = Result<T, CallControlError>;

/// Operations on a live call leg.
#[async_trait]
pub trait CallControl: Send + Sync {
    async fn start_recording(&self, call_id: &str) -> CallControlResult<()>;

    async fn end_call(&self, call_id: &str) -> CallControlResult<()>;
}

/// Start recording in the background, logging any failure.
pub fn spawn_start_recording(control: Arc<dyn CallControl>, call_id: String) {
    tokio::spawn(async move {
        match control.start_recording(&call_id).await {
            Ok(()) => info!("Started recording for call {}", call_id),
            Err(e) => error!("Failed to start recording for call {}: {}", call_id, e),
        }
    });
}

/// Hang up the call in the background, logging any failure.
pub fn spawn_end_call(control: Arc<dyn CallControl>, call_id: String) {
    tokio::spawn(async move {
        match control.end_call(&call_id).await {
            Ok(()) => info!("Ended call {}", call_id),
            Err(e) => error!("Failed to end call {}: {}", call_id, e),
        }
    });
}

#[derive(Debug, Deserialize)]
struct TwilioErrorResponse {
    #[serde(default)]
    code: Option<u32>,
    message: String,
}

/// Twilio REST implementation of [`CallControl`].
pub struct TwilioCallControl {
    http_client: Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
}

impl TwilioCallControl {
    pub fn new(
        base_url: impl Into<String>,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> CallControlResult<Self> {
        let account_sid = account_sid.into();
        let auth_token = auth_token.into();
        if account_sid.is_empty() || auth_token.is_empty() {
            return Err(CallControlError::NotConfigured(
                "Twilio account SID and auth token are required".to_string(),
            ));
        }

        let http_client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                CallControlError::NotConfigured(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            account_sid,
            auth_token,
        })
    }

    fn call_url(&self, call_id: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls/{}",
            self.base_url, self.account_sid, call_id
        )
    }

    async fn post_form(&self, url: String, form: &[(&str, &str)]) -> CallControlResult<()> {
        debug!("POST {}", url);
        let response = self
            .http_client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(form)
            .send()
            .await
            .map_err(|e| CallControlError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .map_err(|e| CallControlError::NetworkError(format!("Failed to read response: {e}")))?;
        let message = match serde_json::from_str::<TwilioErrorResponse>(&body) {
            Ok(err) => match err.code {
                Some(code) => format!("{} (code {})", err.message, code),
                None => err.message,
            },
            Err(_) => body,
        };

        Err(CallControlError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl CallControl for TwilioCallControl {
    async fn start_recording(&self, call_id: &str) -> CallControlResult<()> {
        let url = format!("{}/Recordings.json", self.call_url(call_id));
        self.post_form(url, &[]).await
    }

    async fn end_call(&self, call_id: &str) -> CallControlResult<()> {
        let url = format!("{}.json", self.call_url(call_id));
        self.post_form(url, &[("Status", "completed")]).await
    }
}

/// Used when no telephony credentials are configured.
#[derive(Debug, Default, Clone)]
pub struct NoopCallControl;

#[async_trait]
impl CallControl for NoopCallControl {
    async fn start_recording(&self, call_id: &str) -> CallControlResult<()> {
        debug!("Call control disabled, not recording call {}", call_id);
        Ok(())
    }

    async fn end_call(&self, call_id: &str) -> CallControlResult<()> {
        debug!("Call control disabled, not ending call {}", call_id);
        Ok(())
    }
}
