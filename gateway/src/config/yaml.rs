use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Environment variables fill
/// anything the file leaves out.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3004
///   stream_secret: "change-me"
///   voice_processing_mode: "realtime"
///   tls:
///     enabled: true
///     cert_path: "/etc/relay/cert.pem"
///     key_path: "/etc/relay/key.pem"
///
/// providers:
///   openai_api_key: "sk-..."
///
/// realtime:
///   model: "gpt-4o-mini-realtime-preview"
///   voice: "sage"
///   temperature: 0.6
///   session_init_delay_ms: 100
///
/// call:
///   record: true
///   end_call_delay_ms: 5000
///   goodbye_phrases: ["bye", "goodbye"]
///   initial_message: "Hello!"
///   call_type: "outbound"
///
/// twilio:
///   account_sid: "AC..."
///   auth_token: "..."
///
/// pipeline:
///   chat_provider: "openrouter"
///   chat_model: "gpt-4o-mini"
///   stt_command: "python3 stt_worker.py"
///   tts_command: "python3 tts_worker.py"
///
/// security:
///   cors_allowed_origins: "*"
///   max_websocket_connections: 100
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub providers: Option<ProvidersYaml>,
    pub realtime: Option<RealtimeYaml>,
    pub call: Option<CallYaml>,
    pub twilio: Option<TwilioYaml>,
    pub pipeline: Option<PipelineYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
    pub stream_secret: Option<String>,
    pub voice_processing_mode: Option<String>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    pub openai_api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RealtimeYaml {
    pub url: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub temperature: Option<f32>,
    pub transcription_model: Option<String>,
    pub session_init_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CallYaml {
    pub record: Option<bool>,
    pub end_call_delay_ms: Option<u64>,
    pub show_timing_math: Option<bool>,
    pub goodbye_phrases: Option<Vec<String>>,
    pub initial_message: Option<String>,
    pub call_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TwilioYaml {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub api_base_url: Option<String>,
}

/// Pipeline mode collaborators from YAML
///
/// Worker commands are written as a single string and split on whitespace.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PipelineYaml {
    pub chat_provider: Option<String>,
    pub chat_model: Option<String>,
    pub chat_api_key: Option<String>,
    pub chat_base_url: Option<String>,
    pub chat_temperature: Option<f32>,
    pub chat_max_tokens: Option<u32>,
    pub stt_command: Option<String>,
    pub tts_command: Option<String>,
    pub goodbye_message: Option<String>,
    pub end_call_delay_ms: Option<u64>,
    pub close_delay_ms: Option<u64>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
    pub max_websocket_connections: Option<usize>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Required fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
