//! Job records and their state machine.
//!
//! All status and timing changes go through the transition methods on [`Job`],
//! which keep the record's invariants intact: `results.len() == processed_items`,
//! `processed_items <= total_items`, `pause_start_time` set only while paused,
//! and `end_time` set only once a terminal status is reached. A stopped job
//! still records outcomes of requests that were in flight at the stop.
//!
//! Timestamps come from `now_ms`, which runs on tokio's clock so paused-time
//! tests see the same elapsed values a real run would.

use std::sync::{Arc, LazyLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;

use crate::error::{AppError, ErrorPresentation};
use crate::jobs::elapsed::{elapsed_secs, format_elapsed};

/// One opaque unit of work (e.g. one contact to import).
pub type WorkItem = Value;

// ─────────────────────────────────────────────────────────────────────────────
// JobStatus
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Paused,
    Completed,
    Failed,
    Stopped,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Stopped => "stopped",
        }
    }

    /// Returns true if the job can no longer transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Stopped
        )
    }

    /// Running or paused: the job still owns its account's "current" slot.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Processing | JobStatus::Paused)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JobKind
// ─────────────────────────────────────────────────────────────────────────────

/// Operation kind. Jobs of different kinds for the same account coexist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Import,
    Send,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Import => "import",
            JobKind::Send => "send",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Item results
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Success,
    Error,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Success => "success",
            ItemStatus::Error => "error",
        }
    }
}

/// Outcome of one work item. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    pub index: usize,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemResult {
    pub fn success(index: usize, data: Value) -> Self {
        Self {
            index,
            status: ItemStatus::Success,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(index: usize, message: impl Into<String>) -> Self {
        Self {
            index,
            status: ItemStatus::Error,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ItemStatus::Success
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Job
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the store needs to build a record, minus identity and timing.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub kind: JobKind,
    pub title: String,
    pub items: Arc<Vec<WorkItem>>,
    pub batch_size: usize,
    pub delay_ms: u64,
}

/// One bulk operation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub account_id: String,
    pub kind: JobKind,
    pub title: String,
    pub status: JobStatus,
    pub total_items: usize,
    pub processed_items: usize,
    pub data: Arc<Vec<WorkItem>>,
    pub results: Vec<ItemResult>,
    pub batch_size: usize,
    pub delay_ms: u64,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub total_paused_ms: i64,
    pub pause_start_time: Option<i64>,
    pub error: Option<String>,
    /// Creation order within the owning store.
    pub seq: u64,
}

impl Job {
    pub fn new(id: String, account_id: String, spec: NewJob, seq: u64, now: i64) -> Self {
        Self {
            id,
            account_id,
            kind: spec.kind,
            title: spec.title,
            status: JobStatus::Pending,
            total_items: spec.items.len(),
            processed_items: 0,
            data: spec.items,
            results: Vec::new(),
            batch_size: spec.batch_size,
            delay_ms: spec.delay_ms,
            start_time: now,
            end_time: None,
            total_paused_ms: 0,
            pause_start_time: None,
            error: None,
            seq,
        }
    }

    /// pending → processing.
    pub fn start(&mut self) -> bool {
        if self.status != JobStatus::Pending {
            return false;
        }
        self.status = JobStatus::Processing;
        true
    }

    /// processing → paused.
    pub fn pause(&mut self, now: i64) -> bool {
        if self.status != JobStatus::Processing {
            return false;
        }
        self.status = JobStatus::Paused;
        self.pause_start_time = Some(now);
        true
    }

    /// paused → processing, folding the pause interval into `total_paused_ms`.
    pub fn resume(&mut self, now: i64) -> bool {
        if self.status != JobStatus::Paused {
            return false;
        }
        self.close_pause(now);
        self.status = JobStatus::Processing;
        true
    }

    /// Moves to a terminal status. Returns false if already terminal.
    pub fn finish(&mut self, status: JobStatus, now: i64) -> bool {
        debug_assert!(status.is_terminal());
        if self.status.is_terminal() {
            return false;
        }
        self.close_pause(now);
        self.status = status;
        self.end_time = Some(now);
        true
    }

    /// Whole-job fault: terminal `failed` with a reason.
    pub fn fail(&mut self, reason: impl Into<String>, now: i64) -> bool {
        if !self.finish(JobStatus::Failed, now) {
            return false;
        }
        self.error = Some(reason.into());
        true
    }

    /// Appends an item outcome. Refused once the job is full, completed or
    /// failed. A stopped job still takes the outcomes of requests that were in
    /// flight when the stop arrived; `end_time` stays at the stop.
    pub fn record(&mut self, result: ItemResult) -> bool {
        let closed = matches!(self.status, JobStatus::Completed | JobStatus::Failed);
        if closed || self.processed_items >= self.total_items {
            return false;
        }
        self.results.push(result);
        self.processed_items += 1;
        true
    }

    fn close_pause(&mut self, now: i64) {
        if let Some(paused_at) = self.pause_start_time.take() {
            self.total_paused_ms += (now - paused_at).max(0);
        }
    }

    /// Fraction of items processed, 0.0..=1.0.
    pub fn progress(&self) -> f64 {
        if self.total_items == 0 {
            return 0.0;
        }
        self.processed_items as f64 / self.total_items as f64
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed_items(&self) -> usize {
        self.processed_items - self.succeeded()
    }

    pub fn view(&self, now: i64) -> JobView {
        let elapsed = elapsed_secs(self, now);
        JobView {
            id: self.id.clone(),
            account_id: self.account_id.clone(),
            kind: self.kind,
            title: self.title.clone(),
            status: self.status,
            total_items: self.total_items,
            processed_items: self.processed_items,
            succeeded: self.succeeded(),
            failed: self.failed_items(),
            progress: self.progress(),
            results: self.results.clone(),
            batch_size: self.batch_size,
            delay_ms: self.delay_ms,
            start_time: self.start_time,
            end_time: self.end_time,
            elapsed_secs: elapsed,
            elapsed_label: format_elapsed(elapsed),
            error: self.error.clone(),
            failure: self.failure().map(|e| e.to_presentation()),
        }
    }

    /// The whole-job fault of a failed job, as an application error.
    pub fn failure(&self) -> Option<AppError> {
        if self.status != JobStatus::Failed {
            return None;
        }
        Some(AppError::JobFailed {
            job_id: self.id.clone(),
            message: self.error.clone().unwrap_or_default(),
        })
    }

    pub fn progress_snapshot(&self) -> JobProgress {
        JobProgress {
            id: self.id.clone(),
            account_id: self.account_id.clone(),
            kind: self.kind,
            status: self.status,
            processed_items: self.processed_items,
            total_items: self.total_items,
            progress: self.progress(),
            latest_result: self.results.last().cloned(),
        }
    }
}

/// What the UI renders for a job: no raw work list, elapsed time derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    pub id: String,
    pub account_id: String,
    pub kind: JobKind,
    pub title: String,
    pub status: JobStatus,
    pub total_items: usize,
    pub processed_items: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub progress: f64,
    pub results: Vec<ItemResult>,
    pub batch_size: usize,
    pub delay_ms: u64,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub elapsed_secs: u64,
    pub elapsed_label: String,
    pub error: Option<String>,
    /// Set only for failed jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ErrorPresentation>,
}

/// Compact progress payload carried by store notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub id: String,
    pub account_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub processed_items: usize,
    pub total_items: usize,
    pub progress: f64,
    pub latest_result: Option<ItemResult>,
}

/// Wall-clock reading taken once, paired with a real monotonic instant.
static CLOCK_ANCHOR: LazyLock<(i64, std::time::Instant)> = LazyLock::new(|| {
    let wall = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default();
    (wall, std::time::Instant::now())
});

/// Current time in epoch milliseconds.
///
/// Offsets the anchor by tokio's clock, so readings are monotonic and follow
/// virtual time when the clock is paused.
pub(crate) fn now_ms() -> i64 {
    let (wall, anchor) = *CLOCK_ANCHOR;
    let now = Instant::now().into_std();
    match now.checked_duration_since(anchor) {
        Some(ahead) => wall + ahead.as_millis() as i64,
        None => wall - anchor.duration_since(now).as_millis() as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job_with(items: usize) -> Job {
        let spec = NewJob {
            kind: JobKind::Import,
            title: "Import contacts".into(),
            items: Arc::new((0..items).map(|i| json!({ "n": i })).collect()),
            batch_size: 1,
            delay_ms: 0,
        };
        let mut job = Job::new("job-1".into(), "acct-1".into(), spec, 0, 10_000);
        assert!(job.start());
        job
    }

    #[test]
    fn status_str_matches_serde_name() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Paused,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Stopped,
        ] {
            assert_eq!(serde_json::to_value(status).unwrap(), json!(status.as_str()));
        }
    }

    #[test]
    fn terminal_and_active_sets_are_disjoint() {
        assert!(JobStatus::Stopped.is_terminal());
        assert!(!JobStatus::Paused.is_terminal());
        assert!(JobStatus::Paused.is_active());
        assert!(!JobStatus::Completed.is_active());
        assert!(!JobStatus::Pending.is_active());
    }

    #[test]
    fn record_keeps_results_and_count_in_step() {
        let mut job = job_with(2);
        assert!(job.record(ItemResult::success(1, json!({ "id": 7 }))));
        assert!(job.record(ItemResult::error(2, "duplicate contact")));
        assert_eq!(job.processed_items, 2);
        assert_eq!(job.results.len(), job.processed_items);
        assert_eq!(job.succeeded(), 1);
        assert_eq!(job.failed_items(), 1);

        // Full: a third outcome is refused.
        assert!(!job.record(ItemResult::success(3, json!(null))));
        assert_eq!(job.results.len(), 2);
        assert!((job.progress() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn pause_resume_accumulates_paused_time() {
        let mut job = job_with(1);
        assert!(job.pause(11_000));
        assert_eq!(job.pause_start_time, Some(11_000));
        assert!(!job.pause(11_500), "double pause is a no-op");

        assert!(job.resume(14_000));
        assert_eq!(job.pause_start_time, None);
        assert_eq!(job.total_paused_ms, 3_000);

        assert!(job.pause(15_000));
        assert!(job.resume(16_000));
        assert_eq!(job.total_paused_ms, 4_000);
        assert!(!job.resume(17_000), "resume requires paused");
    }

    #[test]
    fn stop_while_paused_closes_the_pause() {
        let mut job = job_with(3);
        job.pause(12_000);
        assert!(job.finish(JobStatus::Stopped, 15_000));
        assert_eq!(job.status, JobStatus::Stopped);
        assert_eq!(job.end_time, Some(15_000));
        assert_eq!(job.pause_start_time, None);
        assert_eq!(job.total_paused_ms, 3_000);

        assert!(!job.finish(JobStatus::Completed, 16_000), "terminal is final");
        assert_eq!(job.end_time, Some(15_000));
    }

    #[tokio::test(start_paused = true)]
    async fn now_follows_the_tokio_clock() {
        let before = now_ms();
        tokio::time::advance(std::time::Duration::from_secs(90)).await;
        let after = now_ms();
        assert!((89_990..90_050).contains(&(after - before)));
    }

    #[test]
    fn stopped_job_takes_in_flight_outcome_but_completed_does_not() {
        let mut stopped = job_with(3);
        stopped.record(ItemResult::success(1, json!(null)));
        stopped.finish(JobStatus::Stopped, 20_000);
        assert!(stopped.record(ItemResult::success(2, json!({ "sent": true }))));
        assert_eq!(stopped.processed_items, 2);
        assert_eq!(stopped.results.len(), 2);
        assert_eq!(stopped.status, JobStatus::Stopped);
        assert_eq!(stopped.end_time, Some(20_000));

        let mut completed = job_with(2);
        completed.record(ItemResult::success(1, json!(null)));
        completed.finish(JobStatus::Completed, 20_000);
        assert!(!completed.record(ItemResult::success(2, json!(null))));

        let mut failed = job_with(2);
        failed.fail("list missing", 20_000);
        assert!(!failed.record(ItemResult::success(1, json!(null))));
        assert!(failed.results.is_empty());
    }

    #[test]
    fn fail_sets_reason_once() {
        let mut job = job_with(1);
        assert!(job.fail("list missing", 12_000));
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("list missing"));
        assert!(!job.fail("second", 13_000));
        assert_eq!(job.error.as_deref(), Some("list missing"));
    }

    #[test]
    fn failed_job_view_carries_job_failed_presentation() {
        let mut job = job_with(2);
        assert!(job.failure().is_none());
        job.fail("Audience list not found", 12_000);

        assert!(matches!(
            job.failure(),
            Some(AppError::JobFailed { ref message, .. }) if message == "Audience list not found"
        ));
        let view = job.view(20_000);
        let failure = view.failure.expect("failed jobs carry a presentation");
        assert_eq!(failure.title, "Bulk Job Failed");
        assert_eq!(failure.message, "Audience list not found");
    }

    #[test]
    fn view_omits_work_list_and_derives_elapsed() {
        let mut job = job_with(1);
        job.record(ItemResult::success(1, json!("ok")));
        job.finish(JobStatus::Completed, 75_000);

        let view = serde_json::to_value(job.view(999_999)).expect("serializable");
        assert!(view.get("data").is_none());
        assert!(view.get("failure").is_none());
        assert_eq!(view["elapsed_secs"], 65);
        assert_eq!(view["elapsed_label"], "01:05");
        assert_eq!(view["status"], "completed");
    }

    #[test]
    fn item_result_serializes_only_its_payload() {
        let ok = serde_json::to_value(ItemResult::success(1, json!({ "id": 3 }))).unwrap();
        assert_eq!(ok, json!({ "index": 1, "status": "success", "data": { "id": 3 } }));

        let err = serde_json::to_value(ItemResult::error(2, "rejected")).unwrap();
        assert_eq!(err, json!({ "index": 2, "status": "error", "error": "rejected" }));
    }
}
