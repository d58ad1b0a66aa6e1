//! Batched concatenation.
//!
//! FFmpeg's concat filter degrades badly with many inputs, so long clip lists
//! are merged as a tree: consecutive batches are merged into intermediates,
//! then the intermediates are merged the same way until one file is left.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::engine::MediaEngine;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{move_file, remove_if_exists};

/// Inputs merged per batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// A file at one level of the reduction, tagged with whether this engine
/// created it (and may therefore delete it once merged).
struct Level {
    path: PathBuf,
    intermediate: bool,
}

/// Iterative tree reduction over [`MediaEngine::concat`].
pub struct BatchConcatenator<'a> {
    engine: &'a dyn MediaEngine,
    batch_size: usize,
    work_dir: PathBuf,
    consume_inputs: bool,
}

impl<'a> BatchConcatenator<'a> {
    /// `work_dir` receives the intermediate batch files.
    pub fn new(engine: &'a dyn MediaEngine, work_dir: impl AsRef<Path>) -> Self {
        Self {
            engine,
            batch_size: DEFAULT_BATCH_SIZE,
            work_dir: work_dir.as_ref().to_path_buf(),
            consume_inputs: false,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Delete the caller's input files once they have been merged.
    pub fn consume_inputs(mut self, consume: bool) -> Self {
        self.consume_inputs = consume;
        self
    }

    /// Merge `inputs` in order into `output`.
    pub async fn concat(&self, inputs: &[PathBuf], output: &Path) -> MediaResult<()> {
        if inputs.is_empty() {
            return Err(MediaError::invalid_argument("nothing to concatenate"));
        }
        if self.batch_size < 2 {
            return Err(MediaError::invalid_argument(format!(
                "batch size must be at least 2, got {}",
                self.batch_size
            )));
        }

        tokio::fs::create_dir_all(&self.work_dir).await?;

        let mut current: Vec<Level> = inputs
            .iter()
            .map(|p| Level {
                path: p.clone(),
                intermediate: false,
            })
            .collect();
        let mut depth = 0usize;

        while current.len() > 1 {
            let mut next = Vec::with_capacity(current.len().div_ceil(self.batch_size));

            for (index, batch) in current.chunks(self.batch_size).enumerate() {
                if let [only] = batch {
                    next.push(Level {
                        path: only.path.clone(),
                        intermediate: only.intermediate,
                    });
                    continue;
                }

                let merged = self
                    .work_dir
                    .join(format!("batch_{:02}_{:04}.mp4", depth, index));
                let paths: Vec<PathBuf> = batch.iter().map(|l| l.path.clone()).collect();
                debug!(depth, index, inputs = paths.len(), "Merging batch");

                self.engine.concat(&paths, &merged).await?;

                for consumed in batch {
                    self.release(consumed).await?;
                }
                next.push(Level {
                    path: merged,
                    intermediate: true,
                });
            }

            current = next;
            depth += 1;
        }

        let Some(last) = current.pop() else {
            return Err(MediaError::internal("concatenation produced no output"));
        };

        if last.intermediate || self.consume_inputs {
            move_file(&last.path, output).await?;
        } else {
            tokio::fs::copy(&last.path, output).await?;
        }

        info!(
            inputs = inputs.len(),
            levels = depth,
            batch_size = self.batch_size,
            output = %output.display(),
            "Concatenation complete"
        );
        Ok(())
    }

    async fn release(&self, level: &Level) -> MediaResult<()> {
        if level.intermediate || self.consume_inputs {
            remove_if_exists(&level.path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Byte-level concatenation: deterministic and trivially comparable.
    #[derive(Default)]
    struct ByteMerger {
        calls: AtomicUsize,
        max_inputs: AtomicUsize,
    }

    #[async_trait]
    impl MediaEngine for ByteMerger {
        async fn duration(&self, _path: &Path) -> MediaResult<f64> {
            Err(MediaError::internal("unused"))
        }
        async fn extract(&self, _: &Path, _: f64, _: f64, _: &Path) -> MediaResult<()> {
            Err(MediaError::internal("unused"))
        }
        async fn stretch_video(&self, _: &Path, _: f64, _: &Path) -> MediaResult<()> {
            Err(MediaError::internal("unused"))
        }
        async fn stretch_audio(&self, _: &Path, _: f64, _: &Path) -> MediaResult<()> {
            Err(MediaError::internal("unused"))
        }
        async fn mux(&self, _: &Path, _: &Path, _: f64, _: &Path) -> MediaResult<()> {
            Err(MediaError::internal("unused"))
        }
        async fn concat(&self, inputs: &[PathBuf], output: &Path) -> MediaResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.max_inputs.fetch_max(inputs.len(), Ordering::SeqCst);
            let mut bytes = Vec::new();
            for input in inputs {
                bytes.extend(tokio::fs::read(input).await?);
            }
            tokio::fs::write(output, bytes).await?;
            Ok(())
        }
    }

    async fn write_clips(dir: &Path, count: usize) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for i in 0..count {
            let path = dir.join(format!("clip_{:03}.bin", i));
            tokio::fs::write(&path, format!("<{}>", i)).await.unwrap();
            paths.push(path);
        }
        paths
    }

    #[tokio::test]
    async fn test_output_independent_of_batch_size() {
        let dir = tempfile::tempdir().unwrap();
        let clips = write_clips(dir.path(), 23).await;
        let engine = ByteMerger::default();

        let mut outputs = Vec::new();
        for batch_size in [2, 3, 5] {
            let out = dir.path().join(format!("out_{}.bin", batch_size));
            BatchConcatenator::new(&engine, dir.path().join(format!("work_{}", batch_size)))
                .with_batch_size(batch_size)
                .concat(&clips, &out)
                .await
                .unwrap();
            outputs.push(tokio::fs::read(&out).await.unwrap());
        }

        let expected: String = (0..23).map(|i| format!("<{}>", i)).collect();
        for output in &outputs {
            assert_eq!(output, expected.as_bytes());
        }
        assert!(engine.max_inputs.load(Ordering::SeqCst) <= 5);
    }

    #[tokio::test]
    async fn test_intermediates_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let clips = write_clips(dir.path(), 12).await;
        let work = dir.path().join("work");
        let engine = ByteMerger::default();

        BatchConcatenator::new(&engine, &work)
            .concat(&clips, &dir.path().join("final.bin"))
            .await
            .unwrap();

        // 12 -> 3 -> 1
        assert_eq!(engine.calls.load(Ordering::SeqCst), 4);
        let mut leftovers = tokio::fs::read_dir(&work).await.unwrap();
        assert!(leftovers.next_entry().await.unwrap().is_none());
        assert!(clips.iter().all(|c| c.exists()));
    }

    #[tokio::test]
    async fn test_consume_inputs_deletes_sources() {
        let dir = tempfile::tempdir().unwrap();
        let clips = write_clips(dir.path(), 2).await;
        let engine = ByteMerger::default();

        BatchConcatenator::new(&engine, dir.path().join("work"))
            .with_batch_size(2)
            .consume_inputs(true)
            .concat(&clips, &dir.path().join("final.bin"))
            .await
            .unwrap();

        assert!(clips.iter().all(|c| !c.exists()));
    }

    #[tokio::test]
    async fn test_single_input_is_copied() {
        let dir = tempfile::tempdir().unwrap();
        let clips = write_clips(dir.path(), 1).await;
        let out = dir.path().join("final.bin");
        let engine = ByteMerger::default();

        BatchConcatenator::new(&engine, dir.path().join("work"))
            .concat(&clips, &out)
            .await
            .unwrap();

        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
        assert_eq!(tokio::fs::read(&out).await.unwrap(), b"<0>");
        assert!(clips[0].exists());
    }

    #[tokio::test]
    async fn test_rejects_degenerate_input() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ByteMerger::default();
        let out = dir.path().join("final.bin");

        let empty = BatchConcatenator::new(&engine, dir.path()).concat(&[], &out).await;
        assert!(matches!(empty, Err(MediaError::InvalidArgument(_))));

        let clips = write_clips(dir.path(), 3).await;
        let tiny = BatchConcatenator::new(&engine, dir.path())
            .with_batch_size(1)
            .concat(&clips, &out)
            .await;
        assert!(matches!(tiny, Err(MediaError::InvalidArgument(_))));
    }
}
