//! Bounded-concurrency fan-out over segments.
//!
//! Each segment runs as its own task holding one semaphore permit. Finished
//! segments are sent to a single aggregator task, which owns the result list
//! and reports progress in completion order. The first segment that still
//! fails after its retries raises the abort flag: nothing new is scheduled,
//! tasks already running are left to finish, and the job fails once they
//! have drained.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn, Instrument};

use dubcast_models::TransformationId;

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::retry::{retry_async, BackoffPolicy};
use crate::segment::{SegmentJob, SegmentOutput, SegmentTask};
use crate::store::TransformationStore;

/// Receives job progress (0–100) as segments complete.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, progress: f64) -> WorkerResult<()>;
}

/// Writes progress onto a transformation row.
pub struct StoreProgress {
    store: Arc<dyn TransformationStore>,
    id: TransformationId,
}

impl StoreProgress {
    pub fn new(store: Arc<dyn TransformationStore>, id: TransformationId) -> Self {
        Self { store, id }
    }
}

#[async_trait]
impl ProgressSink for StoreProgress {
    async fn report(&self, progress: f64) -> WorkerResult<()> {
        self.store.update_progress(self.id, progress).await?;
        Ok(())
    }
}

/// `100 * completed / total`, rounded to two decimals.
pub fn progress_percent(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let raw = 100.0 * completed as f64 / total as f64;
    (raw * 100.0).round() / 100.0
}

/// Runs segment tasks with at most `parallelism` in flight.
#[derive(Debug, Clone, Copy)]
pub struct SegmentScheduler {
    parallelism: usize,
    segment_backoff: BackoffPolicy,
}

impl SegmentScheduler {
    pub fn new(parallelism: usize, segment_backoff: BackoffPolicy) -> Self {
        Self {
            parallelism: parallelism.max(1),
            segment_backoff,
        }
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Process every job and return the outputs sorted by segment id.
    pub async fn run(
        &self,
        task: Arc<dyn SegmentTask>,
        jobs: Vec<SegmentJob>,
        progress: Arc<dyn ProgressSink>,
    ) -> WorkerResult<Vec<SegmentOutput>> {
        let total = jobs.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let limiter = Arc::new(Semaphore::new(self.parallelism));
        let abort = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = mpsc::channel::<SegmentOutput>(total);

        let aggregator = tokio::spawn(async move {
            let mut results = Vec::with_capacity(total);
            while let Some(output) = rx.recv().await {
                results.push(output);
                let percent = progress_percent(results.len(), total);
                if let Err(e) = progress.report(percent).await {
                    warn!(progress = percent, error = %e, "Failed to record progress");
                }
                debug!(completed = results.len(), total, "Segment completed");
            }
            results
        });

        let mut tasks: JoinSet<WorkerResult<()>> = JoinSet::new();
        let mut failure: Option<WorkerError> = None;

        for job in jobs {
            while let Some(joined) = tasks.try_join_next() {
                record_outcome(joined, &abort, &mut failure);
            }

            let permit = limiter
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::job_failed("segment limiter closed"))?;

            if abort.load(Ordering::SeqCst) {
                info!(
                    remaining_from = job.index,
                    "Job aborted, not scheduling further segments"
                );
                drop(permit);
                break;
            }

            let task = task.clone();
            let tx = tx.clone();
            let abort = abort.clone();
            let backoff = self.segment_backoff;
            let span = tracing::info_span!("segment", segment_id = job.segment.id);

            tasks.spawn(
                async move {
                    let _permit = permit;
                    let index = job.index;
                    let result =
                        retry_async(&backoff, "segment", |_: &WorkerError| true, || {
                            task.process(&job)
                        })
                        .await;

                    match result.into_result() {
                        Ok(output) => {
                            // Capacity equals the job count, so this never waits.
                            let _ = tx.send(output).await;
                            Ok(())
                        }
                        Err(e) => {
                            abort.store(true, Ordering::SeqCst);
                            metrics::record_segment_failed();
                            error!(index, error = %e, "Segment failed, aborting job");
                            Err(WorkerError::segment_failed(index, e))
                        }
                    }
                }
                .instrument(span),
            );
        }
        drop(tx);

        while let Some(joined) = tasks.join_next().await {
            record_outcome(joined, &abort, &mut failure);
        }

        let mut results = aggregator
            .await
            .map_err(|e| WorkerError::job_failed(format!("progress aggregator failed: {}", e)))?;

        if let Some(e) = failure {
            return Err(e);
        }
        if results.len() != total {
            return Err(WorkerError::job_failed(format!(
                "{} of {} segments produced output",
                results.len(),
                total
            )));
        }

        results.sort_by_key(|output| output.segment.id);
        Ok(results)
    }
}

/// Keep the first failure; later ones are only logged.
fn record_outcome(
    joined: Result<WorkerResult<()>, JoinError>,
    abort: &AtomicBool,
    failure: &mut Option<WorkerError>,
) {
    let err = match joined {
        Ok(Ok(())) => return,
        Ok(Err(e)) => e,
        Err(e) => {
            abort.store(true, Ordering::SeqCst);
            WorkerError::job_failed(format!("segment task panicked: {}", e))
        }
    };

    match failure {
        None => *failure = Some(err),
        Some(_) => warn!(error = %err, "Additional segment failure while draining"),
    }
}
