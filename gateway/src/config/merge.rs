use std::env;
use std::path::PathBuf;

use super::utils::{generate_stream_secret, parse_bool, split_command, split_list};
use super::yaml::YamlConfig;
use super::{
    CallSettings, PipelineSettings, RealtimeSettings, ServerConfig, TlsConfig, TwilioSettings,
    VoiceProcessingMode,
};
use crate::core::call::CallType;
use crate::core::pipeline::ChatProvider;

/// Merge YAML configuration with environment variables
///
/// Priority order (highest to lowest):
/// 1. YAML configuration values
/// 2. Environment variables
/// 3. Default values
///
/// # Arguments
/// * `yaml_config` - Optional YAML configuration to use as overrides
///
/// # Returns
/// * `Result<ServerConfig, Box<dyn std::error::Error>>` - The merged configuration or an error
pub fn merge_config(
    yaml_config: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let yaml = yaml_config.unwrap_or_default();
    let defaults = ServerConfig::default();

    // Helper macro to get value with priority: YAML > ENV > Default
    macro_rules! get_value {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            $yaml_value
                .or_else(|| env::var($env_var).ok())
                .unwrap_or_else(|| $default.to_string())
        };
    }

    // Helper macro for optional values: YAML > ENV. Blank values count as unset.
    macro_rules! get_optional {
        ($env_var:expr, $yaml_value:expr) => {
            $yaml_value
                .or_else(|| env::var($env_var).ok())
                .filter(|v: &String| !v.trim().is_empty())
        };
    }

    // Helper macro for parsed values: YAML > ENV > Default, rejecting malformed ENV
    macro_rules! get_parsed {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            match $yaml_value {
                Some(value) => value,
                None => match env::var($env_var) {
                    Ok(raw) => raw
                        .trim()
                        .parse()
                        .map_err(|e| format!("Invalid {} environment variable: {e}", $env_var))?,
                    Err(_) => $default,
                },
            }
        };
    }

    // Helper macro for booleans: YAML > ENV > Default
    macro_rules! get_bool {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            match $yaml_value {
                Some(value) => value,
                None => match env::var($env_var) {
                    Ok(raw) => parse_bool(&raw).ok_or_else(|| {
                        format!("Invalid {} environment variable: {raw}", $env_var)
                    })?,
                    Err(_) => $default,
                },
            }
        };
    }

    let server = yaml.server.as_ref();
    let tls_yaml = server.and_then(|s| s.tls.as_ref());
    let realtime = yaml.realtime.as_ref();
    let call = yaml.call.as_ref();
    let twilio = yaml.twilio.as_ref();
    let pipeline = yaml.pipeline.as_ref();
    let security = yaml.security.as_ref();

    // Server configuration
    let host = get_value!("HOST", server.and_then(|s| s.host.clone()), defaults.host);
    let port: u16 = get_parsed!("PORT", server.and_then(|s| s.port), defaults.port);

    let tls_enabled = get_bool!("TLS_ENABLED", tls_yaml.and_then(|t| t.enabled), false);
    let tls = if tls_enabled {
        let cert_path = get_optional!("TLS_CERT_PATH", tls_yaml.and_then(|t| t.cert_path.clone()))
            .ok_or("TLS_CERT_PATH is required when TLS is enabled")?;
        let key_path = get_optional!("TLS_KEY_PATH", tls_yaml.and_then(|t| t.key_path.clone()))
            .ok_or("TLS_KEY_PATH is required when TLS is enabled")?;
        Some(TlsConfig {
            cert_path: PathBuf::from(cert_path),
            key_path: PathBuf::from(key_path),
        })
    } else {
        None
    };

    let configured_secret = get_optional!(
        "STREAM_SECRET",
        server.and_then(|s| s.stream_secret.clone())
    );
    let stream_secret_generated = configured_secret.is_none();
    let stream_secret = configured_secret.unwrap_or_else(generate_stream_secret);

    let voice_processing_mode = match get_optional!(
        "VOICE_PROCESSING_MODE",
        server.and_then(|s| s.voice_processing_mode.clone())
    ) {
        Some(mode) => VoiceProcessingMode::parse(&mode)
            .ok_or_else(|| format!("Unknown VOICE_PROCESSING_MODE: {mode}"))?,
        None => VoiceProcessingMode::default(),
    };

    let openai_api_key = get_optional!(
        "OPENAI_API_KEY",
        yaml.providers
            .as_ref()
            .and_then(|p| p.openai_api_key.clone())
    );

    // Realtime AI
    let realtime_defaults = RealtimeSettings::default();
    let realtime = RealtimeSettings {
        url: get_value!(
            "OPENAI_REALTIME_URL",
            realtime.and_then(|r| r.url.clone()),
            realtime_defaults.url
        ),
        model: get_value!(
            "OPENAI_REALTIME_MODEL",
            realtime.and_then(|r| r.model.clone()),
            realtime_defaults.model
        ),
        voice: get_value!(
            "OPENAI_VOICE",
            realtime.and_then(|r| r.voice.clone()),
            realtime_defaults.voice
        ),
        temperature: get_parsed!(
            "OPENAI_TEMPERATURE",
            realtime.and_then(|r| r.temperature),
            realtime_defaults.temperature
        ),
        transcription_model: get_value!(
            "OPENAI_TRANSCRIPTION_MODEL",
            realtime.and_then(|r| r.transcription_model.clone()),
            realtime_defaults.transcription_model
        ),
        session_init_delay_ms: get_parsed!(
            "SESSION_INIT_DELAY_MS",
            realtime.and_then(|r| r.session_init_delay_ms),
            realtime_defaults.session_init_delay_ms
        ),
    };

    // Call behavior
    let call_defaults = CallSettings::default();
    let goodbye_phrases = match call.and_then(|c| c.goodbye_phrases.clone()) {
        Some(phrases) => phrases,
        None => env::var("GOODBYE_PHRASES")
            .ok()
            .map(|raw| split_list(&raw))
            .unwrap_or(call_defaults.goodbye_phrases),
    };
    let call = CallSettings {
        record_calls: get_bool!("RECORD", call.and_then(|c| c.record), false),
        end_call_delay_ms: get_parsed!(
            "END_CALL_DELAY_MS",
            call.and_then(|c| c.end_call_delay_ms),
            call_defaults.end_call_delay_ms
        ),
        show_timing_math: get_bool!(
            "SHOW_TIMING_MATH",
            call.and_then(|c| c.show_timing_math),
            false
        ),
        goodbye_phrases,
        initial_message: get_value!(
            "INITIAL_MESSAGE",
            call.and_then(|c| c.initial_message.clone()),
            call_defaults.initial_message
        ),
        call_type: get_optional!("CALL_TYPE", call.and_then(|c| c.call_type.clone()))
            .map(|t| CallType::from_str_or_default(&t))
            .unwrap_or_default(),
    };

    // Twilio call control
    let twilio = TwilioSettings {
        account_sid: get_optional!(
            "TWILIO_ACCOUNT_SID",
            twilio.and_then(|t| t.account_sid.clone())
        ),
        auth_token: get_optional!(
            "TWILIO_AUTH_TOKEN",
            twilio.and_then(|t| t.auth_token.clone())
        ),
        api_base_url: get_value!(
            "TWILIO_API_BASE_URL",
            twilio.and_then(|t| t.api_base_url.clone()),
            TwilioSettings::default().api_base_url
        ),
    };

    // Pipeline collaborators
    let pipeline_defaults = PipelineSettings::default();
    let chat_provider = match get_optional!(
        "CHAT_PROVIDER",
        pipeline.and_then(|p| p.chat_provider.clone())
    ) {
        Some(provider) => ChatProvider::parse(&provider)
            .ok_or_else(|| format!("Unknown CHAT_PROVIDER: {provider}"))?,
        None => pipeline_defaults.chat_provider,
    };
    let pipeline = PipelineSettings {
        chat_provider,
        chat_model: get_value!(
            "CHAT_MODEL",
            pipeline.and_then(|p| p.chat_model.clone()),
            pipeline_defaults.chat_model
        ),
        chat_api_key: get_optional!(
            "CHAT_API_KEY",
            pipeline.and_then(|p| p.chat_api_key.clone())
        ),
        chat_base_url: get_optional!(
            "CHAT_BASE_URL",
            pipeline.and_then(|p| p.chat_base_url.clone())
        ),
        chat_temperature: get_parsed!(
            "CHAT_TEMPERATURE",
            pipeline.and_then(|p| p.chat_temperature),
            pipeline_defaults.chat_temperature
        ),
        chat_max_tokens: get_parsed!(
            "CHAT_MAX_TOKENS",
            pipeline.and_then(|p| p.chat_max_tokens),
            pipeline_defaults.chat_max_tokens
        ),
        stt_command: get_optional!("STT_COMMAND", pipeline.and_then(|p| p.stt_command.clone()))
            .map(|c| split_command(&c))
            .unwrap_or_default(),
        tts_command: get_optional!("TTS_COMMAND", pipeline.and_then(|p| p.tts_command.clone()))
            .map(|c| split_command(&c))
            .unwrap_or_default(),
        goodbye_message: get_value!(
            "PIPELINE_GOODBYE_MESSAGE",
            pipeline.and_then(|p| p.goodbye_message.clone()),
            pipeline_defaults.goodbye_message
        ),
        end_call_delay_ms: get_parsed!(
            "PIPELINE_END_CALL_DELAY_MS",
            pipeline.and_then(|p| p.end_call_delay_ms),
            pipeline_defaults.end_call_delay_ms
        ),
        close_delay_ms: get_parsed!(
            "PIPELINE_CLOSE_DELAY_MS",
            pipeline.and_then(|p| p.close_delay_ms),
            pipeline_defaults.close_delay_ms
        ),
    };

    // Security configuration
    let cors_allowed_origins = get_optional!(
        "CORS_ALLOWED_ORIGINS",
        security.and_then(|s| s.cors_allowed_origins.clone())
    );
    let max_websocket_connections = match security.and_then(|s| s.max_websocket_connections) {
        Some(max) => Some(max),
        None => match env::var("MAX_WEBSOCKET_CONNECTIONS") {
            Ok(raw) => Some(raw.trim().parse::<usize>().map_err(|e| {
                format!("Invalid MAX_WEBSOCKET_CONNECTIONS environment variable: {e}")
            })?),
            Err(_) => None,
        },
    };

    let mut config = defaults;
    config.host = host;
    config.port = port;
    config.tls = tls;
    config.stream_secret = stream_secret;
    config.stream_secret_generated = stream_secret_generated;
    config.voice_processing_mode = voice_processing_mode;
    config.openai_api_key = openai_api_key;
    config.realtime = realtime;
    config.call = call;
    config.twilio = twilio;
    config.pipeline = pipeline;
    config.cors_allowed_origins = cors_allowed_origins;
    config.max_websocket_connections = max_websocket_connections;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::cleanup_env_vars;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_merge_defaults() {
        cleanup_env_vars();

        let config = merge_config(None).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3004);
        assert_eq!(config.voice_processing_mode, VoiceProcessingMode::Realtime);
        assert_eq!(config.realtime.model, "gpt-4o-mini-realtime-preview");
        assert_eq!(config.realtime.session_init_delay_ms, 100);
        assert_eq!(config.call.end_call_delay_ms, 5000);
        assert_eq!(config.call.initial_message, "Hello!");
        assert_eq!(config.call.call_type, CallType::Outbound);
        assert!(!config.call.record_calls);
        assert_eq!(config.pipeline.end_call_delay_ms, 3000);
        assert_eq!(config.pipeline.close_delay_ms, 2000);
        assert!(config.tls.is_none());
        assert!(!config.stream_secret.is_empty());
        assert!(config.stream_secret_generated);
    }

    #[test]
    #[serial]
    fn test_merge_env_values() {
        cleanup_env_vars();
        unsafe {
            env::set_var("VOICE_PROCESSING_MODE", "vosk_coqui");
            env::set_var("RECORD", "yes");
            env::set_var("SHOW_TIMING_MATH", "on");
            env::set_var("GOODBYE_PHRASES", "adios, ciao");
            env::set_var("CALL_TYPE", "inbound");
            env::set_var("CHAT_PROVIDER", "openrouter");
            env::set_var("STT_COMMAND", "python3 stt.py --rate 8000");
            env::set_var("MAX_WEBSOCKET_CONNECTIONS", "25");
        }

        let config = merge_config(None).unwrap();
        assert_eq!(config.voice_processing_mode, VoiceProcessingMode::Pipeline);
        assert!(config.call.record_calls);
        assert!(config.call.show_timing_math);
        assert_eq!(config.call.goodbye_phrases, vec!["adios", "ciao"]);
        assert_eq!(config.call.call_type, CallType::Inbound);
        assert_eq!(config.pipeline.chat_provider, ChatProvider::OpenRouter);
        assert_eq!(
            config.pipeline.stt_command,
            vec!["python3", "stt.py", "--rate", "8000"]
        );
        assert_eq!(config.max_websocket_connections, Some(25));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_merge_rejects_malformed_values() {
        cleanup_env_vars();

        unsafe { env::set_var("PORT", "not-a-port") };
        assert!(
            merge_config(None)
                .unwrap_err()
                .to_string()
                .contains("PORT")
        );
        cleanup_env_vars();

        unsafe { env::set_var("RECORD", "maybe") };
        assert!(merge_config(None).is_err());
        cleanup_env_vars();

        unsafe { env::set_var("VOICE_PROCESSING_MODE", "telepathy") };
        assert!(
            merge_config(None)
                .unwrap_err()
                .to_string()
                .contains("VOICE_PROCESSING_MODE")
        );
        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_merge_tls_requires_paths() {
        cleanup_env_vars();
        unsafe {
            env::set_var("TLS_ENABLED", "true");
            env::set_var("TLS_CERT_PATH", "/tmp/cert.pem");
        }

        let err = merge_config(None).unwrap_err();
        assert!(err.to_string().contains("TLS_KEY_PATH"));

        unsafe { env::set_var("TLS_KEY_PATH", "/tmp/key.pem") };
        let config = merge_config(None).unwrap();
        let tls = config.tls.as_ref().unwrap();
        assert_eq!(tls.cert_path, PathBuf::from("/tmp/cert.pem"));

        cleanup_env_vars();
    }
}
