//! Per-job control signals.
//!
//! The pause flag and cancellation token live outside the job record so the
//! execution loop can poll them without touching the store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

// ─────────────────────────────────────────────────────────────────────────────
// JobSignals
// ─────────────────────────────────────────────────────────────────────────────

/// Control handle shared between the public API and one job's loop.
#[derive(Debug, Clone, Default)]
pub struct JobSignals {
    cancel: CancellationToken,
    paused: Arc<AtomicBool>,
}

impl JobSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once `cancel()` has been called.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Signals for every job whose loop is still running, keyed by job id.
#[derive(Debug, Default)]
pub struct SignalRegistry {
    signals: Mutex<HashMap<String, JobSignals>>,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job_id: String, signals: JobSignals) {
        self.signals.lock().insert(job_id, signals);
    }

    /// Gets and clones the signals for the given job.
    pub fn get(&self, job_id: &str) -> Option<JobSignals> {
        self.signals.lock().get(job_id).cloned()
    }

    pub fn remove(&self, job_id: &str) {
        self.signals.lock().remove(job_id);
    }

    /// Cancels every registered loop. Returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let guard = self.signals.lock();
        for signals in guard.values() {
            signals.cancel();
        }
        guard.len()
    }

    pub fn len(&self) -> usize {
        self.signals.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
