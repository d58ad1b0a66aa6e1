//! Clients for the remote services a dubbing job depends on.
//!
//! Each client makes a single attempt per call and bounds its own
//! concurrency; callers decide whether to retry using
//! [`ProviderError::is_retryable`].

pub mod elevenlabs;
pub mod error;
mod http;
pub mod openai;
pub mod replicate;
pub mod traits;

pub use elevenlabs::{ElevenLabsConfig, ElevenLabsSynthesizer};
pub use error::{ProviderError, ProviderResult};
pub use openai::{OpenAiConfig, OpenAiTranslator};
pub use replicate::{ReplicateClient, ReplicateConfig, ReplicateLipSync, ReplicateTranscriber};
pub use traits::{LipSyncer, SpeechSynthesizer, Transcriber, TranslationRequest, Translator};
