//! Derived elapsed time.
//!
//! Elapsed time is never stored: it is recomputed from the job's timestamps on
//! every clock tick, so it freezes while paused and once the job is terminal.

use crate::jobs::model::{Job, JobStatus};

/// Whole seconds the job has spent running (paused intervals excluded).
pub fn elapsed_secs(job: &Job, now: i64) -> u64 {
    let end = match job.end_time {
        Some(end) if job.status.is_terminal() => end,
        _ => now,
    };

    let mut raw = end - job.start_time - job.total_paused_ms;
    if job.status == JobStatus::Paused {
        if let Some(paused_at) = job.pause_start_time {
            raw -= now - paused_at;
        }
    }

    (raw.max(0) / 1000) as u64
}

/// `MM:SS`, or `H:MM:SS` past the hour.
pub fn format_elapsed(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
