use super::{ServerConfig, TlsConfig, TwilioSettings, VoiceProcessingMode};

/// Run every check against a merged configuration.
pub fn validate_server_config(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_tls(&config.tls)?;
    validate_mode_credentials(config)?;
    validate_temperature("OPENAI_TEMPERATURE", config.realtime.temperature)?;
    validate_temperature("CHAT_TEMPERATURE", config.pipeline.chat_temperature)?;
    validate_recording(config.call.record_calls, &config.twilio)?;
    validate_goodbye_phrases(&config.call.goodbye_phrases)?;
    Ok(())
}

/// Validate TLS configuration
///
/// Both files must exist when TLS is enabled.
pub fn validate_tls(tls: &Option<TlsConfig>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(tls) = tls else {
        return Ok(());
    };
    if !tls.cert_path.exists() {
        return Err(format!(
            "TLS_CERT_PATH file does not exist: {}",
            tls.cert_path.display()
        )
        .into());
    }
    if !tls.key_path.exists() {
        return Err(format!(
            "TLS_KEY_PATH file does not exist: {}",
            tls.key_path.display()
        )
        .into());
    }
    Ok(())
}

/// Validate that the selected voice processing mode has what it needs
///
/// Realtime mode needs an OpenAI key. Pipeline mode needs both worker commands
/// and a chat API key.
pub fn validate_mode_credentials(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    match config.voice_processing_mode {
        VoiceProcessingMode::Realtime => {
            if config.openai_api_key.as_deref().is_none_or(str::is_empty) {
                return Err("OPENAI_API_KEY is required when VOICE_PROCESSING_MODE=realtime".into());
            }
        }
        VoiceProcessingMode::Pipeline => {
            if config.pipeline.stt_command.is_empty() {
                return Err("STT_COMMAND is required when VOICE_PROCESSING_MODE=pipeline".into());
            }
            if config.pipeline.tts_command.is_empty() {
                return Err("TTS_COMMAND is required when VOICE_PROCESSING_MODE=pipeline".into());
            }
            if config.chat_api_key().is_none() {
                return Err(
                    "CHAT_API_KEY or OPENAI_API_KEY is required when VOICE_PROCESSING_MODE=pipeline"
                        .into(),
                );
            }
        }
    }
    Ok(())
}

/// Sampling temperatures must lie in [0.0, 2.0]
pub fn validate_temperature(name: &str, value: f32) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=2.0).contains(&value) {
        return Err(format!("{name} must be between 0.0 and 2.0, got {value}").into());
    }
    Ok(())
}

/// Recording goes through the Twilio REST API, so it needs credentials
pub fn validate_recording(
    record_calls: bool,
    twilio: &TwilioSettings,
) -> Result<(), Box<dyn std::error::Error>> {
    if record_calls && !twilio.has_credentials() {
        return Err(
            "RECORD=true requires TWILIO_ACCOUNT_SID and TWILIO_AUTH_TOKEN to be configured".into(),
        );
    }
    Ok(())
}

pub fn validate_goodbye_phrases(phrases: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    if phrases.iter().all(|p| p.trim().is_empty()) {
        return Err("GOODBYE_PHRASES must contain at least one phrase".into());
    }
    Ok(())
}
