//! Speech synthesis through the ElevenLabs text-to-speech API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

use dubcast_models::VoiceSelector;

use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, ensure_success, env_or, env_parse};
use crate::traits::SpeechSynthesizer;

const SERVICE: &str = "elevenlabs";

#[derive(Debug, Clone)]
pub struct ElevenLabsConfig {
    pub api_key: String,
    pub base_url: String,
    /// Multilingual model; the target language is inferred from the text
    pub model_id: String,
    pub male_voice_id: String,
    pub female_voice_id: String,
    pub stability: f64,
    pub similarity_boost: f64,
    pub timeout: Duration,
    pub max_concurrent: usize,
}

impl ElevenLabsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.elevenlabs.io".to_string(),
            model_id: "eleven_multilingual_v2".to_string(),
            male_voice_id: "XMQab44ShF40jzdHBoXu".to_string(),
            female_voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            stability: 1.0,
            similarity_boost: 1.0,
            timeout: Duration::from_secs(120),
            max_concurrent: 5,
        }
    }

    pub fn from_env() -> ProviderResult<Self> {
        let api_key = std::env::var("ELEVENLABS_API_KEY")
            .map_err(|_| ProviderError::config("ELEVENLABS_API_KEY not set"))?;
        let defaults = Self::new(api_key);
        Ok(Self {
            base_url: env_or("ELEVENLABS_BASE_URL", &defaults.base_url),
            model_id: env_or("ELEVENLABS_MODEL_ID", &defaults.model_id),
            male_voice_id: env_or("ELEVENLABS_MALE_VOICE_ID", &defaults.male_voice_id),
            female_voice_id: env_or("ELEVENLABS_FEMALE_VOICE_ID", &defaults.female_voice_id),
            timeout: Duration::from_secs(env_parse("ELEVENLABS_TIMEOUT_SECS", 120)),
            max_concurrent: env_parse("ELEVENLABS_MAX_CONCURRENT", defaults.max_concurrent),
            ..defaults
        })
    }

    /// Provider voice id for a selector.
    pub fn voice_id<'a>(&'a self, voice: &'a VoiceSelector) -> &'a str {
        match voice {
            VoiceSelector::Male => &self.male_voice_id,
            VoiceSelector::Female => &self.female_voice_id,
            VoiceSelector::Custom(id) => id,
        }
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f64,
    similarity_boost: f64,
}

/// [`SpeechSynthesizer`] returning MP3 audio.
pub struct ElevenLabsSynthesizer {
    http: Client,
    config: ElevenLabsConfig,
    limiter: Arc<Semaphore>,
}

impl ElevenLabsSynthesizer {
    pub fn new(config: ElevenLabsConfig) -> ProviderResult<Self> {
        Ok(Self {
            http: build_client(config.timeout)?,
            limiter: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            config,
        })
    }

    pub fn from_env() -> ProviderResult<Self> {
        Self::new(ElevenLabsConfig::from_env()?)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        target_language: &str,
        voice: &VoiceSelector,
    ) -> ProviderResult<Vec<u8>> {
        let voice_id = self.config.voice_id(voice);
        let url = format!("{}/v1/text-to-speech/{}", self.config.base_url, voice_id);
        let body = SpeechRequest {
            text,
            model_id: &self.config.model_id,
            voice_settings: VoiceSettings {
                stability: self.config.stability,
                similarity_boost: self.config.similarity_boost,
            },
        };

        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| ProviderError::LimiterClosed)?;

        debug!(voice_id, language = target_language, chars = text.len(), "Requesting speech");

        let response = self
            .http
            .post(&url)
            .header("xi-api-key", &self.config.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&body)
            .send()
            .await?;
        let audio = ensure_success(SERVICE, response).await?.bytes().await?;

        if audio.is_empty() {
            return Err(ProviderError::invalid_response(SERVICE, "empty audio"));
        }
        Ok(audio.to_vec())
    }
}
