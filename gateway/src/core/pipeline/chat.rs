//! Chat completion collaborator for the pipeline mode.
//!
//! Both supported providers speak the OpenAI chat completions protocol, so a
//! single client covers them with different base URLs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{PipelineError, PipelineResult};
use crate::core::call::ConversationMessage;

pub const OPENAI_CHAT_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENROUTER_CHAT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_CHAT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_CHAT_MAX_TOKENS: u32 = 150;

const CHAT_TIMEOUT_SECS: u64 = 30;

/// Supported chat providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatProvider {
    #[default]
    OpenAI,
    OpenRouter,
}

impl ChatProvider {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Some(Self::OpenAI),
            "openrouter" => Some(Self::OpenRouter),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::OpenRouter => "openrouter",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAI => OPENAI_CHAT_BASE_URL,
            Self::OpenRouter => OPENROUTER_CHAT_BASE_URL,
        }
    }
}

#[derive(Clone)]
pub struct ChatServiceConfig {
    pub provider: ChatProvider,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl std::fmt::Debug for ChatServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatServiceConfig")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Generates the assistant's next reply from the conversation so far.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn generate_response(&self, history: &[ConversationMessage]) -> PipelineResult<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiCompatibleChat {
    config: ChatServiceConfig,
    client: Client,
}

impl OpenAiCompatibleChat {
    pub fn new(config: ChatServiceConfig) -> PipelineResult<Self> {
        if config.api_key.is_empty() {
            return Err(PipelineError::InvalidConfiguration(format!(
                "API key required for chat provider {}",
                config.provider.as_str()
            )));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(CHAT_TIMEOUT_SECS))
            .build()
            .map_err(|e| PipelineError::Network(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatService for OpenAiCompatibleChat {
    async fn generate_response(&self, history: &[ConversationMessage]) -> PipelineResult<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: history,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        };

        let mut builder = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.config.api_key)
            .json(&request);
        if self.config.provider == ChatProvider::OpenRouter {
            builder = builder.header("X-Title", "Voice Relay Gateway");
        }

        let response = builder
            .send()
            .await
            .map_err(|e| PipelineError::Network(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PipelineError::ChatApi {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Network(format!("Invalid chat response: {e}")))?;

        let reply = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default();
        debug!("Chat reply: {} chars", reply.len());
        Ok(reply)
    }
}
