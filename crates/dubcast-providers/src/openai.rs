//! Translation through the OpenAI chat completions API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, ensure_success, env_or, env_parse};
use crate::traits::{TranslationRequest, Translator};

const SERVICE: &str = "openai";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    /// Concurrent requests allowed
    pub max_concurrent: usize,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4".to_string(),
            timeout: Duration::from_secs(60),
            max_concurrent: 2,
        }
    }

    pub fn from_env() -> ProviderResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ProviderError::config("OPENAI_API_KEY not set"))?;
        let defaults = Self::new(api_key);
        Ok(Self {
            base_url: env_or("OPENAI_BASE_URL", &defaults.base_url),
            model: env_or("OPENAI_MODEL", &defaults.model),
            timeout: Duration::from_secs(env_parse("OPENAI_TIMEOUT_SECS", 60)),
            max_concurrent: env_parse("OPENAI_MAX_CONCURRENT", defaults.max_concurrent),
            ..defaults
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// [`Translator`] backed by a chat model.
pub struct OpenAiTranslator {
    http: Client,
    config: OpenAiConfig,
    limiter: Arc<Semaphore>,
}

impl OpenAiTranslator {
    pub fn new(config: OpenAiConfig) -> ProviderResult<Self> {
        Ok(Self {
            http: build_client(config.timeout)?,
            limiter: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            config,
        })
    }

    pub fn from_env() -> ProviderResult<Self> {
        Self::new(OpenAiConfig::from_env()?)
    }
}

fn system_prompt(request: &TranslationRequest) -> String {
    let language = &request.target_language;
    let mut prompt = format!(
        "Translate the following text to colloquial, everyday spoken {language}. \
         Provide the output in {language} alphabet. Just give the output."
    );

    if !request.context_before.is_empty() || !request.context_after.is_empty() {
        prompt.push_str(
            "\nThe text is one line of a longer conversation. \
             Use the surrounding lines only to choose wording; do not translate them.",
        );
        if !request.context_before.is_empty() {
            prompt.push_str("\nPreceding lines:\n");
            prompt.push_str(&request.context_before.join("\n"));
        }
        if !request.context_after.is_empty() {
            prompt.push_str("\nFollowing lines:\n");
            prompt.push_str(&request.context_after.join("\n"));
        }
    }

    prompt
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate(&self, request: &TranslationRequest) -> ProviderResult<String> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt(request),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.text.clone(),
                },
            ],
        };

        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| ProviderError::LimiterClosed)?;

        let url = format!("{}/v1/chat/completions", self.config.base_url);
        debug!(chars = request.text.len(), language = %request.target_language, "Requesting translation");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;
        let response: ChatResponse = ensure_success(SERVICE, response).await?.json().await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| ProviderError::invalid_response(SERVICE, "no choices returned"))?;

        if text.is_empty() {
            return Err(ProviderError::invalid_response(SERVICE, "empty translation"));
        }
        Ok(text)
    }
}
