//! Object storage for dubbing media.
//!
//! This crate provides:
//! - The [`ObjectStore`] interface the dubbing pipeline depends on
//! - A Cloudflare R2 implementation over the S3 API
//! - Presigned links for handing media to remote collaborators

pub mod client;
pub mod error;
pub mod store;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use store::{content_type_for, ObjectStore};
