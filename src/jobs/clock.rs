//! Wall-clock ticker for live elapsed time.
//!
//! Every tick recomputes elapsed seconds for the processing and paused jobs and
//! broadcasts them as a [`JobEvent::Tick`]. The clock never mutates a job.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::jobs::elapsed::elapsed_secs;
use crate::jobs::model::now_ms;
use crate::jobs::store::{JobElapsed, JobEvent, JobStore};

/// Running clock task. Dropping the handle leaves the clock running; call `stop`.
pub struct ClockHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ClockHandle {
    /// Stops ticking and waits for the task to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Computes one tick's payload: elapsed seconds for each active job.
pub fn tick_snapshot(store: &JobStore, now: i64) -> Vec<JobElapsed> {
    store
        .list_active()
        .iter()
        .map(|job| JobElapsed {
            id: job.id.clone(),
            elapsed_secs: elapsed_secs(job, now),
        })
        .collect()
}

/// Spawns the ticker on the current runtime.
pub fn spawn_clock(store: Arc<JobStore>, period: Duration) -> ClockHandle {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!("[JOB-CLOCK] Started with period {:?}", period);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let now = now_ms();
                    let jobs = tick_snapshot(&store, now);
                    // Idle ticks are not broadcast.
                    if !jobs.is_empty() {
                        store.publish(JobEvent::Tick { at: now, jobs });
                    }
                }
            }
        }

        debug!("[JOB-CLOCK] Stopped");
    });

    ClockHandle { cancel, task }
}
