//! Replicate predictions: Whisper transcription and lip-sync.
//!
//! A prediction is started with a POST and then polled until it reaches a
//! terminal status. Starting and polling have separate limiters since polls
//! are cheap and frequent. The transcriber and the lip-syncer each own a
//! client, so one never waits on the other's permits.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use dubcast_models::Transcript;

use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, ensure_success, env_or, env_parse};
use crate::traits::{LipSyncer, Transcriber};

const SERVICE: &str = "replicate";

#[derive(Debug, Clone)]
pub struct ReplicateConfig {
    pub api_key: String,
    pub base_url: String,
    /// Prediction endpoint for the Whisper deployment, relative to `base_url`
    pub whisper_path: String,
    pub whisper_model: String,
    /// Model version used for lip-sync predictions
    pub lipsync_version: String,
    pub poll_interval: Duration,
    /// Give up on a prediction that has not finished after this long
    pub prediction_timeout: Duration,
    pub request_timeout: Duration,
    pub max_concurrent_starts: usize,
    pub max_concurrent_polls: usize,
}

impl ReplicateConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.replicate.com".to_string(),
            whisper_path: "/v1/models/openai/whisper/predictions".to_string(),
            whisper_model: "large-v2".to_string(),
            lipsync_version: "8d65e3f4f4298520e079198b493c25adfc43c058ffec924f2aefc8010ed25eef"
                .to_string(),
            poll_interval: Duration::from_millis(500),
            prediction_timeout: Duration::from_secs(30 * 60),
            request_timeout: Duration::from_secs(120),
            max_concurrent_starts: 10,
            max_concurrent_polls: 50,
        }
    }

    pub fn from_env() -> ProviderResult<Self> {
        let api_key = std::env::var("REPLICATE_API_TOKEN")
            .map_err(|_| ProviderError::config("REPLICATE_API_TOKEN not set"))?;
        let defaults = Self::new(api_key);
        Ok(Self {
            base_url: env_or("REPLICATE_BASE_URL", &defaults.base_url),
            whisper_path: env_or("REPLICATE_WHISPER_PATH", &defaults.whisper_path),
            whisper_model: env_or("REPLICATE_WHISPER_MODEL", &defaults.whisper_model),
            lipsync_version: env_or("REPLICATE_LIPSYNC_VERSION", &defaults.lipsync_version),
            poll_interval: Duration::from_millis(env_parse("REPLICATE_POLL_INTERVAL_MS", 500)),
            prediction_timeout: Duration::from_secs(env_parse(
                "REPLICATE_PREDICTION_TIMEOUT_SECS",
                30 * 60,
            )),
            ..defaults
        })
    }
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Shared Replicate HTTP client.
pub struct ReplicateClient {
    http: Client,
    config: ReplicateConfig,
    start_limiter: Semaphore,
    poll_limiter: Semaphore,
}

impl ReplicateClient {
    pub fn new(config: ReplicateConfig) -> ProviderResult<Self> {
        Ok(Self {
            http: build_client(config.request_timeout)?,
            start_limiter: Semaphore::new(config.max_concurrent_starts.max(1)),
            poll_limiter: Semaphore::new(config.max_concurrent_polls.max(1)),
            config,
        })
    }

    pub fn from_env() -> ProviderResult<Self> {
        Self::new(ReplicateConfig::from_env()?)
    }

    pub fn config(&self) -> &ReplicateConfig {
        &self.config
    }

    /// Start a prediction and wait for its output.
    pub async fn run(&self, path: &str, body: &Value) -> ProviderResult<Value> {
        let started = Instant::now();
        let mut prediction = self.start(path, body).await?;

        loop {
            match prediction.status.as_str() {
                "succeeded" => {
                    debug!(id = %prediction.id, elapsed_ms = started.elapsed().as_millis() as u64, "Prediction succeeded");
                    return prediction.output.ok_or_else(|| {
                        ProviderError::invalid_response(SERVICE, "succeeded without output")
                    });
                }
                "failed" | "canceled" => {
                    return Err(ProviderError::PredictionFailed {
                        message: prediction
                            .error
                            .map(|e| e.to_string())
                            .unwrap_or_else(|| "no error reported".to_string()),
                        id: prediction.id,
                        status: prediction.status,
                    });
                }
                _ => {}
            }

            if started.elapsed() >= self.config.prediction_timeout {
                return Err(ProviderError::Timeout(self.config.prediction_timeout.as_secs()));
            }
            tokio::time::sleep(self.config.poll_interval).await;
            prediction = self.fetch(&prediction.id).await?;
        }
    }

    async fn start(&self, path: &str, body: &Value) -> ProviderResult<Prediction> {
        let _permit = self
            .start_limiter
            .acquire()
            .await
            .map_err(|_| ProviderError::LimiterClosed)?;

        let response = self
            .http
            .post(format!("{}{}", self.config.base_url, path))
            .header(reqwest::header::AUTHORIZATION, format!("Token {}", self.config.api_key))
            .json(body)
            .send()
            .await?;
        let prediction: Prediction = ensure_success(SERVICE, response).await?.json().await?;

        if let Some(error) = prediction.error.as_ref().filter(|e| !e.is_null()) {
            return Err(ProviderError::PredictionFailed {
                id: prediction.id.clone(),
                status: prediction.status.clone(),
                message: error.to_string(),
            });
        }
        debug!(id = %prediction.id, "Prediction started");
        Ok(prediction)
    }

    async fn fetch(&self, id: &str) -> ProviderResult<Prediction> {
        let _permit = self
            .poll_limiter
            .acquire()
            .await
            .map_err(|_| ProviderError::LimiterClosed)?;

        let response = self
            .http
            .get(format!("{}/v1/predictions/{}", self.config.base_url, id))
            .header(reqwest::header::AUTHORIZATION, format!("Token {}", self.config.api_key))
            .send()
            .await?;
        Ok(ensure_success(SERVICE, response).await?.json().await?)
    }

    /// Download a prediction output file.
    pub async fn download(&self, url: &str, output: &Path) -> ProviderResult<u64> {
        let response = self.http.get(url).send().await?;
        let bytes = ensure_success(SERVICE, response).await?.bytes().await?;
        if bytes.is_empty() {
            return Err(ProviderError::invalid_response(SERVICE, "empty output file"));
        }
        tokio::fs::write(output, &bytes).await?;
        Ok(bytes.len() as u64)
    }
}

/// Whisper with word-level timestamps.
pub struct ReplicateTranscriber {
    client: ReplicateClient,
}

impl ReplicateTranscriber {
    pub fn new(config: ReplicateConfig) -> ProviderResult<Self> {
        Ok(Self {
            client: ReplicateClient::new(config)?,
        })
    }

    pub fn from_env() -> ProviderResult<Self> {
        Self::new(ReplicateConfig::from_env()?)
    }
}

#[async_trait]
impl Transcriber for ReplicateTranscriber {
    async fn transcribe(&self, media_url: &str) -> ProviderResult<Transcript> {
        let body = json!({
            "input": {
                "audio": media_url,
                "model": self.client.config.whisper_model,
                "word_timestamps": true,
            }
        });

        let output = self.client.run(&self.client.config.whisper_path, &body).await?;
        let transcript: Transcript = serde_json::from_value(output).map_err(|e| {
            ProviderError::invalid_response(SERVICE, format!("unexpected whisper output: {}", e))
        })?;

        info!(
            language = %transcript.detected_language,
            segments = transcript.segments.len(),
            "Transcription complete"
        );
        Ok(transcript)
    }
}

/// Lip-sync model fed the dubbed clip as both face and audio.
pub struct ReplicateLipSync {
    client: ReplicateClient,
}

impl ReplicateLipSync {
    pub fn new(config: ReplicateConfig) -> ProviderResult<Self> {
        Ok(Self {
            client: ReplicateClient::new(config)?,
        })
    }

    pub fn from_env() -> ProviderResult<Self> {
        Self::new(ReplicateConfig::from_env()?)
    }
}

fn video_data_url(bytes: &[u8]) -> String {
    format!("data:video/mp4;base64,{}", BASE64.encode(bytes))
}

#[async_trait]
impl LipSyncer for ReplicateLipSync {
    async fn sync(&self, clip: &Path, output: &Path) -> ProviderResult<()> {
        let data_url = video_data_url(&tokio::fs::read(clip).await?);
        let body = json!({
            "version": self.client.config.lipsync_version,
            "input": {
                "face": data_url,
                "audio": data_url,
            }
        });

        let result = self.client.run("/v1/predictions", &body).await?;
        let url = result
            .as_str()
            .ok_or_else(|| ProviderError::invalid_response(SERVICE, "lip-sync output is not a URL"))?;

        let bytes = self.client.download(url, output).await?;
        debug!(bytes, output = %output.display(), "Lip-synced clip downloaded");
        Ok(())
    }
}
