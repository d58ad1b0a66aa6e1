//! Pipeline metrics.
//!
//! Only the `metrics` facade is used here; installing a recorder is left to
//! the embedding process.

use metrics::{counter, histogram};

pub mod names {
    pub const SEGMENTS_PROCESSED_TOTAL: &str = "dubcast_segments_processed_total";
    pub const SEGMENTS_FAILED_TOTAL: &str = "dubcast_segments_failed_total";
    pub const SEGMENT_DURATION_SECONDS: &str = "dubcast_segment_duration_seconds";
    pub const RETRIES_TOTAL: &str = "dubcast_retries_total";
    pub const LIP_SYNC_FALLBACKS_TOTAL: &str = "dubcast_lip_sync_fallbacks_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "dubcast_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "dubcast_jobs_failed_total";
    pub const CREDITS_REIMBURSED_TOTAL: &str = "dubcast_credits_reimbursed_total";
}

pub fn record_retry(operation: &str) {
    counter!(names::RETRIES_TOTAL, "operation" => operation.to_string()).increment(1);
}

pub fn record_segment_processed(duration_secs: f64) {
    counter!(names::SEGMENTS_PROCESSED_TOTAL).increment(1);
    histogram!(names::SEGMENT_DURATION_SECONDS).record(duration_secs);
}

pub fn record_segment_failed() {
    counter!(names::SEGMENTS_FAILED_TOTAL).increment(1);
}

pub fn record_lip_sync_fallback() {
    counter!(names::LIP_SYNC_FALLBACKS_TOTAL).increment(1);
}

pub fn record_job_completed() {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
}

pub fn record_job_failed() {
    counter!(names::JOBS_FAILED_TOTAL).increment(1);
}

pub fn record_credits_reimbursed(credits: i64) {
    counter!(names::CREDITS_REIMBURSED_TOTAL).increment(credits.max(0) as u64);
}
