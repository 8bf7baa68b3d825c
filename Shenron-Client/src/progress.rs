//! Display helpers for wish progress.
//!
//! The percentage synthesized here is purely cosmetic: it fills the bar
//! while the backend stays silent about its own progress.

use std::time::Duration;

use crate::types::{JobStatus, WishStatus};

/// Percentage shown right after a wish is queued.
pub const QUEUED_PERCENT: f64 = 5.0;

const QUEUED_CEILING: f64 = 20.0;
const RUNNING_CEILING: f64 = 95.0;

/// Estimate progress from how much of the mode's budget has elapsed.
///
/// Starts at 5% and grows linearly to 95% at the deadline. Queued jobs
/// never show more than 20%, running jobs never more than 95%.
pub fn estimate_progress(status: JobStatus, elapsed: Duration, budget: Duration) -> f64 {
    let ratio = if budget.is_zero() {
        1.0
    } else {
        (elapsed.as_secs_f64() / budget.as_secs_f64()).min(1.0)
    };
    let estimate = QUEUED_PERCENT + ratio * 90.0;

    match status {
        JobStatus::Queued => estimate.min(QUEUED_CEILING),
        JobStatus::Running => estimate.min(RUNNING_CEILING),
        _ => estimate,
    }
}

/// Human-readable duration: `42s`, `3m 07s`, `2h 5m`. `--` when unknown.
pub fn format_remaining(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds else {
        return "--".to_string();
    };
    let clamped = seconds.max(0.0).round() as u64;
    let minutes = clamped / 60;
    let secs = clamped % 60;

    if minutes > 60 {
        format!("{}h {}m", minutes / 60, minutes % 60)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Summary line shown under the progress bar.
pub fn meta_line(status: &WishStatus, job_id: &str) -> String {
    let mut parts = Vec::with_capacity(3);
    match status.power_mode.as_deref() {
        Some(mode) if !mode.is_empty() => parts.push(format!("Mode: {}", mode)),
        _ => parts.push(format!("Job: {}", job_id)),
    }
    if let Some(eta) = status.estimated_remaining {
        parts.push(format!("ETA: {}", format_remaining(Some(eta))));
    }
    if let Some(elapsed) = status.elapsed_seconds {
        parts.push(format!("Elapsed: {}", format_remaining(Some(elapsed))));
    }
    parts.join(" \u{2022} ")
}
