//! The per-job execution loop.
//!
//! A runner drains one job's work list through its [`ItemProcessor`]. With the
//! default window of one it is strictly sequential: item `i` is recorded before
//! item `i + 1` is dispatched. Pause and stop are observed between items; an
//! in-flight request is never interrupted, and its outcome is recorded even
//! when the job was stopped while it ran.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde_json::Value;
use tokio::task::JoinSet;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::error::sanitize_message;
use crate::jobs::model::{now_ms, ItemResult, JobStatus, WorkItem};
use crate::jobs::processor::{ItemError, ItemProcessor};
use crate::jobs::short_id;
use crate::jobs::signals::{JobSignals, SignalRegistry};
use crate::jobs::store::JobStore;

/// What a spawned item task hands back: the processor's answer, or a panic payload.
type ItemOutcome = Result<Result<Value, ItemError>, Box<dyn Any + Send>>;

/// How the dispatch loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drain {
    /// Every item was dispatched and recorded.
    Complete,
    /// The stop signal was observed.
    Cancelled,
}

pub(crate) struct JobRunner {
    pub(crate) store: Arc<JobStore>,
    pub(crate) registry: Arc<SignalRegistry>,
    pub(crate) signals: JobSignals,
    pub(crate) processor: Arc<dyn ItemProcessor>,
    pub(crate) job_id: String,
    pub(crate) items: Arc<Vec<WorkItem>>,
    pub(crate) batch_size: usize,
    pub(crate) delay: Duration,
    pub(crate) pause_poll: Duration,
}

impl JobRunner {
    /// Runs the job to a terminal status.
    pub(crate) async fn run(self) {
        info!(
            "[JOB-RUNNER] Job {} started: {} items, window {}, delay {:?}",
            short_id(&self.job_id),
            self.items.len(),
            self.batch_size,
            self.delay
        );

        if self.prepare().await {
            match self.drain().await {
                Drain::Complete => self.complete().await,
                Drain::Cancelled => self.finish_stopped(),
            }
        }

        self.registry.remove(&self.job_id);
    }

    /// Runs the processor's one-time setup. Returns false if the job ended.
    async fn prepare(&self) -> bool {
        let prepared = tokio::select! {
            biased;
            _ = self.signals.cancelled() => {
                self.finish_stopped();
                return false;
            }
            prepared = self.processor.prepare() => prepared,
        };

        match prepared {
            Ok(()) => true,
            Err(e) => {
                let reason = e.to_presentation().message;
                warn!(
                    "[JOB-RUNNER] Job {} failed before the first item: {}",
                    short_id(&self.job_id),
                    e
                );
                if let Err(e) = self.store.update(&self.job_id, |job| job.fail(reason, now_ms())) {
                    warn!("[JOB-RUNNER] Could not mark job failed: {}", e);
                }
                false
            }
        }
    }

    /// Dispatches items within the window, honoring pause, delay and stop.
    async fn drain(&self) -> Drain {
        let total = self.items.len();
        let mut in_flight: JoinSet<(usize, ItemOutcome)> = JoinSet::new();
        let mut next = 0usize;
        let mut ready_at: Option<Instant> = None;
        let mut was_paused = false;

        loop {
            if self.signals.is_cancelled() {
                self.settle(&mut in_flight).await;
                return Drain::Cancelled;
            }

            let paused = self.signals.is_paused();
            if paused {
                was_paused = true;
            } else if was_paused {
                // A resumed job still waits the full delay before its next item.
                was_paused = false;
                if next > 0 {
                    ready_at = self.next_slot();
                }
            }
            let window_open = next < total && in_flight.len() < self.batch_size;
            let ready = ready_at.map_or(true, |at| Instant::now() >= at);

            if window_open && !paused && ready {
                self.dispatch(&mut in_flight, next);
                next += 1;
                ready_at = self.next_slot();
                continue;
            }

            if in_flight.is_empty() && next >= total {
                return Drain::Complete;
            }

            let wait_for_pause = window_open && paused;
            let wait_for_delay = window_open && !paused && !ready;
            let deadline = ready_at.unwrap_or_else(Instant::now);

            tokio::select! {
                biased;
                _ = self.signals.cancelled() => {
                    self.settle(&mut in_flight).await;
                    return Drain::Cancelled;
                }
                joined = in_flight.join_next(), if !in_flight.is_empty() => {
                    match joined {
                        Some(Ok((index, outcome))) => {
                            self.record(index, outcome);
                            // The delay separates a completion from the next request.
                            ready_at = self.next_slot();
                        }
                        Some(Err(e)) => {
                            warn!("[JOB-RUNNER] Item task join error: {:?}", e);
                        }
                        None => {}
                    }
                }
                _ = sleep(self.pause_poll), if wait_for_pause => {}
                _ = sleep_until(deadline), if wait_for_delay => {}
            }
        }
    }

    /// Waits out requests already dispatched when the stop arrived and
    /// records their outcomes. Nothing new is dispatched.
    async fn settle(&self, in_flight: &mut JoinSet<(usize, ItemOutcome)>) {
        if !in_flight.is_empty() {
            debug!(
                "[JOB-RUNNER] Job {} settling {} in-flight items",
                short_id(&self.job_id),
                in_flight.len()
            );
        }
        while let Some(joined) = in_flight.join_next().await {
            match joined {
                Ok((index, outcome)) => self.record(index, outcome),
                Err(e) => warn!("[JOB-RUNNER] Item task join error: {:?}", e),
            }
        }
    }

    fn next_slot(&self) -> Option<Instant> {
        if self.delay.is_zero() {
            None
        } else {
            Some(Instant::now() + self.delay)
        }
    }

    fn dispatch(&self, in_flight: &mut JoinSet<(usize, ItemOutcome)>, index: usize) {
        let processor = Arc::clone(&self.processor);
        let item = self.items[index].clone();

        debug!(
            "[JOB-RUNNER] Job {} dispatching item {}/{}",
            short_id(&self.job_id),
            index + 1,
            self.items.len()
        );

        in_flight.spawn(async move {
            let outcome = AssertUnwindSafe(processor.process_item(item))
                .catch_unwind()
                .await;
            (index, outcome)
        });
    }

    fn record(&self, index: usize, outcome: ItemOutcome) {
        let result = match outcome {
            Ok(Ok(data)) => ItemResult::success(index + 1, data),
            Ok(Err(e)) => ItemResult::error(index + 1, e.display_message()),
            Err(payload) => ItemResult::error(index + 1, panic_message(payload.as_ref())),
        };
        let success = result.is_success();

        match self.store.update(&self.job_id, |job| job.record(result)) {
            Ok(true) => debug!(
                "[JOB-RUNNER] Job {} item {} recorded ({})",
                short_id(&self.job_id),
                index + 1,
                if success { "success" } else { "error" }
            ),
            // Completed, failed or already full.
            Ok(false) => debug!(
                "[JOB-RUNNER] Job {} item {} outcome discarded",
                short_id(&self.job_id),
                index + 1
            ),
            Err(e) => warn!("[JOB-RUNNER] Could not record item {}: {}", index + 1, e),
        }
    }

    /// All items recorded: completes once the job is no longer paused.
    async fn complete(&self) {
        if !self.wait_while_paused().await {
            self.finish_stopped();
            return;
        }

        match self
            .store
            .update(&self.job_id, |job| job.finish(JobStatus::Completed, now_ms()))
        {
            Ok(true) => {
                if let Some(job) = self.store.get(&self.job_id) {
                    info!(
                        "[JOB-RUNNER] Job {} completed: {} succeeded, {} failed",
                        short_id(&self.job_id),
                        job.succeeded(),
                        job.failed_items()
                    );
                }
            }
            Ok(false) => {}
            Err(e) => warn!("[JOB-RUNNER] Could not complete job: {}", e),
        }
    }

    async fn wait_while_paused(&self) -> bool {
        while self.signals.is_paused() {
            tokio::select! {
                biased;
                _ = self.signals.cancelled() => return false,
                _ = sleep(self.pause_poll) => {}
            }
        }
        !self.signals.is_cancelled()
    }

    /// Stop normally lands through the public API first; this covers shutdown.
    fn finish_stopped(&self) {
        match self
            .store
            .update(&self.job_id, |job| job.finish(JobStatus::Stopped, now_ms()))
        {
            Ok(true) => info!("[JOB-RUNNER] Job {} stopped", short_id(&self.job_id)),
            Ok(false) => debug!("[JOB-RUNNER] Job {} loop exited", short_id(&self.job_id)),
            Err(e) => warn!("[JOB-RUNNER] Could not stop job: {}", e),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    sanitize_message(
        &format!("Processor panicked: {}", detail),
        "Processor panicked",
    )
}
