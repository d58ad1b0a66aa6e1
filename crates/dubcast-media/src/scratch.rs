//! Per-job scratch directories.
//!
//! Every intermediate artifact of a job lives under one directory named after
//! the job identifier, so a single recursive delete reclaims all of it.
//! [`ScratchArena::cleanup`] is the normal path; `Drop` removes whatever is
//! left if the arena is dropped without it (early return or panic).

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use dubcast_models::JobIdentifier;

use crate::error::MediaResult;

/// Pipeline stage an artifact belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClipStage {
    /// Untouched slice of the source
    Original,
    /// Synthesized speech
    Speech,
    StretchedVideo,
    StretchedAudio,
    /// Stretched video muxed with stretched speech
    Dubbed,
    /// Lip-synced (or fallback) clip
    Synced,
    /// Source slice between this segment and its predecessor
    Gap,
    /// Source slice after the final segment
    Tail,
    /// Synced clip with gap/tail attached
    Filled,
}

impl ClipStage {
    pub fn suffix(&self) -> &'static str {
        match self {
            ClipStage::Original => "original",
            ClipStage::Speech => "speech",
            ClipStage::StretchedVideo => "stretched_video",
            ClipStage::StretchedAudio => "stretched_audio",
            ClipStage::Dubbed => "dubbed",
            ClipStage::Synced => "synced",
            ClipStage::Gap => "gap",
            ClipStage::Tail => "tail",
            ClipStage::Filled => "filled",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ClipStage::Speech => "mp3",
            ClipStage::StretchedAudio => "m4a",
            _ => "mp4",
        }
    }
}

/// Scratch directory owned by one job.
#[derive(Debug)]
pub struct ScratchArena {
    dir: PathBuf,
    stem: String,
    removed: bool,
}

impl ScratchArena {
    /// Create (or reset) `base/<identifier>`.
    pub async fn create(base: impl AsRef<Path>, identifier: &JobIdentifier) -> MediaResult<Self> {
        let stem = identifier.file_stem();
        let dir = base.as_ref().join(&stem);

        if tokio::fs::try_exists(&dir).await? {
            warn!(dir = %dir.display(), "Scratch directory already exists, resetting");
            tokio::fs::remove_dir_all(&dir).await?;
        }
        tokio::fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "Created scratch arena");

        Ok(Self {
            dir,
            stem,
            removed: false,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Local copy of the job's source media.
    pub fn source_path(&self) -> PathBuf {
        self.dir.join("source.mp4")
    }

    /// Path of one segment's artifact at `stage`.
    pub fn clip_path(&self, segment_id: u32, stage: ClipStage) -> PathBuf {
        self.dir.join(format!(
            "{}_{:05}_{}.{}",
            self.stem,
            segment_id,
            stage.suffix(),
            stage.extension()
        ))
    }

    /// Working directory for one batched concatenation.
    pub fn batch_dir(&self, name: &str) -> PathBuf {
        self.dir.join("batches").join(name)
    }

    /// Where the final merged media is assembled.
    pub fn output_path(&self) -> PathBuf {
        self.dir.join(format!("{}_dubbed.mp4", self.stem))
    }

    /// Remove the directory and everything in it.
    pub async fn cleanup(mut self) -> MediaResult<()> {
        self.removed = true;
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                debug!(dir = %self.dir.display(), "Removed scratch arena");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for ScratchArena {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %self.dir.display(), error = %e, "Failed to remove scratch arena");
            }
        }
    }
}
