//! Storage interface used by the dubbing pipeline.

use async_trait::async_trait;
use std::path::Path;

use crate::error::StorageResult;

/// Named-object storage for source and dubbed media.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a local file under `name`.
    async fn upload(&self, name: &str, path: &Path) -> StorageResult<()>;

    /// Temporary URL a remote service can fetch `name` from.
    async fn get_link(&self, name: &str) -> StorageResult<String>;

    /// Download `name` into a local file.
    async fn download(&self, name: &str, path: &Path) -> StorageResult<()>;

    async fn delete(&self, name: &str) -> StorageResult<()>;
}

/// MIME type for an object name, by extension.
pub fn content_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}
