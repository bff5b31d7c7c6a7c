//! Configuration module for the voice relay server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//! The configuration is split into logical submodules for maintainability.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use voice_relay_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::PathBuf;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

use crate::core::call::control::TWILIO_API_BASE_URL;
use crate::core::call::{CallType, DEFAULT_GOODBYE_PHRASES};
use crate::core::pipeline::{
    ChatProvider, ChatServiceConfig,
    chat::{DEFAULT_CHAT_MAX_TOKENS, DEFAULT_CHAT_MODEL, DEFAULT_CHAT_TEMPERATURE},
};
use crate::core::realtime::RealtimeConfig;
use crate::core::realtime::openai::{
    AudioFormat, DEFAULT_REALTIME_MODEL, DEFAULT_TEMPERATURE, DEFAULT_TRANSCRIPTION_MODEL,
    DEFAULT_VOICE, OPENAI_REALTIME_URL,
};

pub use utils::{parse_bool, split_command};
pub use yaml::YamlConfig;

pub const DEFAULT_PORT: u16 = 3004;
pub const DEFAULT_SESSION_INIT_DELAY_MS: u64 = 100;
pub const DEFAULT_END_CALL_DELAY_MS: u64 = 5000;
pub const DEFAULT_INITIAL_MESSAGE: &str = "Hello!";
pub const DEFAULT_PIPELINE_GOODBYE_MESSAGE: &str =
    "Thank you for calling. Have a great day! Goodbye.";
pub const DEFAULT_PIPELINE_END_CALL_DELAY_MS: u64 = 3000;
pub const DEFAULT_PIPELINE_CLOSE_DELAY_MS: u64 = 2000;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Which backend answers the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceProcessingMode {
    /// A single speech-to-speech realtime AI connection.
    #[default]
    Realtime,
    /// Separate speech-to-text, chat and text-to-speech collaborators.
    Pipeline,
}

impl VoiceProcessingMode {
    /// Parse a mode name. `openai` and `vosk_coqui` are accepted as aliases.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "realtime" | "openai" => Some(Self::Realtime),
            "pipeline" | "vosk_coqui" => Some(Self::Pipeline),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Realtime => "realtime",
            Self::Pipeline => "pipeline",
        }
    }
}

impl fmt::Display for VoiceProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Realtime AI connection settings
#[derive(Debug, Clone)]
pub struct RealtimeSettings {
    pub url: String,
    pub model: String,
    pub voice: String,
    pub temperature: f32,
    pub transcription_model: String,
    /// Delay between the AI socket opening and the session configuration
    pub session_init_delay_ms: u64,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            url: OPENAI_REALTIME_URL.to_string(),
            model: DEFAULT_REALTIME_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            session_init_delay_ms: DEFAULT_SESSION_INIT_DELAY_MS,
        }
    }
}

/// Per-call behavior
#[derive(Debug, Clone)]
pub struct CallSettings {
    /// Start recording on the first media frame
    pub record_calls: bool,
    pub end_call_delay_ms: u64,
    /// Log the barge-in elapsed-time computation
    pub show_timing_math: bool,
    pub goodbye_phrases: Vec<String>,
    pub initial_message: String,
    pub call_type: CallType,
}

impl Default for CallSettings {
    fn default() -> Self {
        Self {
            record_calls: false,
            end_call_delay_ms: DEFAULT_END_CALL_DELAY_MS,
            show_timing_math: false,
            goodbye_phrases: DEFAULT_GOODBYE_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            initial_message: DEFAULT_INITIAL_MESSAGE.to_string(),
            call_type: CallType::Outbound,
        }
    }
}

/// Twilio REST credentials for recording and hang-up
#[derive(Debug, Clone)]
pub struct TwilioSettings {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub api_base_url: String,
}

impl Default for TwilioSettings {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            api_base_url: TWILIO_API_BASE_URL.to_string(),
        }
    }
}

impl TwilioSettings {
    pub fn has_credentials(&self) -> bool {
        self.account_sid.as_deref().is_some_and(|s| !s.is_empty())
            && self.auth_token.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// STT, chat and TTS settings for pipeline mode
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub chat_provider: ChatProvider,
    pub chat_model: String,
    /// Falls back to the OpenAI API key when unset
    pub chat_api_key: Option<String>,
    /// Falls back to the provider's public endpoint when unset
    pub chat_base_url: Option<String>,
    pub chat_temperature: f32,
    pub chat_max_tokens: u32,
    /// Speech recognizer worker argv
    pub stt_command: Vec<String>,
    /// Speech synthesizer worker argv
    pub tts_command: Vec<String>,
    pub goodbye_message: String,
    pub end_call_delay_ms: u64,
    pub close_delay_ms: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chat_provider: ChatProvider::OpenAI,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            chat_api_key: None,
            chat_base_url: None,
            chat_temperature: DEFAULT_CHAT_TEMPERATURE,
            chat_max_tokens: DEFAULT_CHAT_MAX_TOKENS,
            stt_command: Vec::new(),
            tts_command: Vec::new(),
            goodbye_message: DEFAULT_PIPELINE_GOODBYE_MESSAGE.to_string(),
            end_call_delay_ms: DEFAULT_PIPELINE_END_CALL_DELAY_MS,
            close_delay_ms: DEFAULT_PIPELINE_CLOSE_DELAY_MS,
        }
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the relay:
/// - Server settings (host, port, TLS)
/// - The media stream secret
/// - Backend mode and the settings for each backend
/// - Call behavior and Twilio call control
/// - Security settings (CORS, connection limits)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// Path segment the media stream must present to connect
    pub stream_secret: String,
    /// True when no secret was configured and `stream_secret` is random
    pub stream_secret_generated: bool,

    pub voice_processing_mode: VoiceProcessingMode,

    /// OpenAI API key for the realtime API (and chat fallback)
    pub openai_api_key: Option<String>,

    pub realtime: RealtimeSettings,
    pub call: CallSettings,
    pub twilio: TwilioSettings,
    pub pipeline: PipelineSettings,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    /// Maximum concurrent media connections
    /// Default: None (unlimited)
    pub max_websocket_connections: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            tls: None,
            stream_secret: utils::generate_stream_secret(),
            stream_secret_generated: true,
            voice_processing_mode: VoiceProcessingMode::Realtime,
            openai_api_key: None,
            realtime: RealtimeSettings::default(),
            call: CallSettings::default(),
            twilio: TwilioSettings::default(),
            pipeline: PipelineSettings::default(),
            cors_allowed_origins: None,
            max_websocket_connections: None,
        }
    }
}

/// Implement Drop to zeroize all secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        self.stream_secret.zeroize();
        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
        if let Some(ref mut token) = self.twilio.auth_token {
            token.zeroize();
        }
        if let Some(ref mut key) = self.pipeline.chat_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // .env is loaded in main.rs, so ENV already reflects it here.
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate_server_config(&config)?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Connection settings for one realtime AI session.
    pub fn realtime_config(&self) -> RealtimeConfig {
        let transcription_model = Some(self.realtime.transcription_model.clone())
            .filter(|model| !model.trim().is_empty());
        RealtimeConfig {
            api_key: self.openai_api_key.clone().unwrap_or_default(),
            url: self.realtime.url.clone(),
            model: self.realtime.model.clone(),
            voice: self.realtime.voice.clone(),
            temperature: self.realtime.temperature,
            audio_format: AudioFormat::G711Ulaw.as_str().to_string(),
            transcription_model,
        }
    }

    /// The chat API key, falling back to the OpenAI key.
    pub fn chat_api_key(&self) -> Option<&str> {
        self.pipeline
            .chat_api_key
            .as_deref()
            .or(self.openai_api_key.as_deref())
            .filter(|key| !key.is_empty())
    }

    /// Settings for the pipeline chat collaborator.
    pub fn chat_config(&self) -> ChatServiceConfig {
        let provider = self.pipeline.chat_provider;
        ChatServiceConfig {
            provider,
            api_key: self.chat_api_key().unwrap_or_default().to_string(),
            model: self.pipeline.chat_model.clone(),
            base_url: self
                .pipeline
                .chat_base_url
                .clone()
                .unwrap_or_else(|| provider.default_base_url().to_string()),
            temperature: self.pipeline.chat_temperature,
            max_tokens: self.pipeline.chat_max_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    pub(super) const ENV_KEYS: &[&str] = &[
        "HOST",
        "PORT",
        "TLS_ENABLED",
        "TLS_CERT_PATH",
        "TLS_KEY_PATH",
        "STREAM_SECRET",
        "VOICE_PROCESSING_MODE",
        "OPENAI_API_KEY",
        "OPENAI_REALTIME_URL",
        "OPENAI_REALTIME_MODEL",
        "OPENAI_VOICE",
        "OPENAI_TEMPERATURE",
        "OPENAI_TRANSCRIPTION_MODEL",
        "SESSION_INIT_DELAY_MS",
        "RECORD",
        "END_CALL_DELAY_MS",
        "SHOW_TIMING_MATH",
        "GOODBYE_PHRASES",
        "INITIAL_MESSAGE",
        "CALL_TYPE",
        "TWILIO_ACCOUNT_SID",
        "TWILIO_AUTH_TOKEN",
        "TWILIO_API_BASE_URL",
        "CHAT_PROVIDER",
        "CHAT_MODEL",
        "CHAT_API_KEY",
        "CHAT_BASE_URL",
        "CHAT_TEMPERATURE",
        "CHAT_MAX_TOKENS",
        "STT_COMMAND",
        "TTS_COMMAND",
        "PIPELINE_GOODBYE_MESSAGE",
        "PIPELINE_END_CALL_DELAY_MS",
        "PIPELINE_CLOSE_DELAY_MS",
        "CORS_ALLOWED_ORIGINS",
        "MAX_WEBSOCKET_CONNECTIONS",
    ];

    // Helper to clean up environment variables
    pub(super) fn cleanup_env_vars() {
        for key in ENV_KEYS {
            unsafe {
                env::remove_var(key);
            }
        }
    }

    #[test]
    fn test_voice_processing_mode_aliases() {
        assert_eq!(
            VoiceProcessingMode::parse("openai"),
            Some(VoiceProcessingMode::Realtime)
        );
        assert_eq!(
            VoiceProcessingMode::parse("VOSK_COQUI"),
            Some(VoiceProcessingMode::Pipeline)
        );
        assert_eq!(VoiceProcessingMode::parse("carrier-pigeon"), None);
    }

    #[test]
    fn test_realtime_config_from_server_config() {
        let mut config = ServerConfig::default();
        config.openai_api_key = Some("sk-test".to_string());
        config.realtime.transcription_model = String::new();

        let realtime = config.realtime_config();
        assert_eq!(realtime.api_key, "sk-test");
        assert_eq!(realtime.audio_format, "g711_ulaw");
        assert_eq!(realtime.voice, "sage");
        assert_eq!(realtime.transcription_model, None);
    }

    #[test]
    fn test_chat_config_falls_back_to_openai_key() {
        let mut config = ServerConfig::default();
        config.openai_api_key = Some("sk-openai".to_string());
        config.pipeline.chat_provider = ChatProvider::OpenRouter;

        let chat = config.chat_config();
        assert_eq!(chat.api_key, "sk-openai");
        assert_eq!(chat.base_url, "https://openrouter.ai/api/v1");

        config.pipeline.chat_api_key = Some("or-key".to_string());
        config.pipeline.chat_base_url = Some("http://localhost:9000/v1".to_string());
        let chat = config.chat_config();
        assert_eq!(chat.api_key, "or-key");
        assert_eq!(chat.base_url, "http://localhost:9000/v1");
    }

    #[test]
    fn test_default_stream_secret_is_random() {
        let a = ServerConfig::default();
        let b = ServerConfig::default();
        assert!(!a.stream_secret.is_empty());
        assert_ne!(a.stream_secret, b.stream_secret);
        assert!(a.stream_secret_generated);
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_only() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 8080
  stream_secret: "yaml-secret"

providers:
  openai_api_key: "yaml-openai-key"

realtime:
  voice: "alloy"
  session_init_delay_ms: 250

call:
  record: false
  goodbye_phrases: ["ciao", "later"]
"#;

        fs::write(&config_path, yaml_content).unwrap();

        let config = ServerConfig::from_file(&config_path).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.stream_secret, "yaml-secret");
        assert!(!config.stream_secret_generated);
        assert_eq!(config.openai_api_key, Some("yaml-openai-key".to_string()));
        assert_eq!(config.realtime.voice, "alloy");
        assert_eq!(config.realtime.session_init_delay_ms, 250);
        assert_eq!(config.call.goodbye_phrases, vec!["ciao", "later"]);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"

providers:
  openai_api_key: "yaml-key"
"#;

        fs::write(&config_path, yaml_content).unwrap();

        unsafe {
            env::set_var("HOST", "0.0.0.0");
            env::set_var("PORT", "9001");
            env::set_var("OPENAI_API_KEY", "env-key");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();

        // YAML overrides ENV
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.openai_api_key, Some("yaml-key".to_string()));
        // ENV value
        assert_eq!(config.port, 9001);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let config_path = PathBuf::from("/nonexistent/config.yaml");
        let result = ServerConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    #[serial]
    fn test_from_file_validation_failure() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "server:\n  port: 8080\n").unwrap();

        // Realtime mode without an API key
        let result = ServerConfig::from_file(&config_path);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("OPENAI_API_KEY"));
    }
}
