//! Collaborator interfaces consumed by the dubbing pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use dubcast_models::{Transcript, VoiceSelector};

use crate::error::ProviderResult;

/// Speech recognition over a fetchable media URL.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Raw (uncleaned) transcript with the detected language.
    async fn transcribe(&self, media_url: &str) -> ProviderResult<Transcript>;
}

/// One line of text to translate, with neighbouring lines for context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub text: String,
    pub target_language: String,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
}

impl TranslationRequest {
    pub fn new(text: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            target_language: target_language.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, before: Vec<String>, after: Vec<String>) -> Self {
        self.context_before = before;
        self.context_after = after;
        self
    }
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, request: &TranslationRequest) -> ProviderResult<String>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Encoded audio (MP3) speaking `text`.
    async fn synthesize(
        &self,
        text: &str,
        target_language: &str,
        voice: &VoiceSelector,
    ) -> ProviderResult<Vec<u8>>;
}

#[async_trait]
pub trait LipSyncer: Send + Sync {
    /// Re-render `clip` with lip movement matching its audio, writing `output`.
    async fn sync(&self, clip: &Path, output: &Path) -> ProviderResult<()>;
}
