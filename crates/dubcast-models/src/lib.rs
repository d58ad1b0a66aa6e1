//! Shared data models for the dubcast pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Transcript segments and word timings
//! - Transformations (one rendition of a project's media) and their status machine
//! - Credit accounting
//! - Voice selection and job identifiers

pub mod credits;
pub mod job;
pub mod segment;
pub mod transcript;
pub mod transformation;
pub mod voice;

// Re-export common types
pub use credits::{credits_for_seconds, CreditBalance};
pub use job::{dubbed_media_name, JobIdentifier};
pub use segment::{Segment, Word};
pub use transcript::Transcript;
pub use transformation::{
    InvalidTransition, NewTransformation, Transformation, TransformationId, TransformationStatus,
};
pub use voice::VoiceSelector;
