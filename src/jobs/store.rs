//! In-memory job store.
//!
//! The store is the single source of truth for rendering. Every mutation runs
//! under one write lock and is published to subscribers afterwards, so readers
//! never observe a half-applied update.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::AppError;
use crate::jobs::model::{now_ms, Job, JobKind, JobProgress, NewJob};

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// Elapsed seconds for one active job at a clock tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobElapsed {
    pub id: String,
    pub elapsed_secs: u64,
}

/// Notifications delivered to subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Created { job: JobProgress },
    Updated { job: JobProgress },
    Tick { at: i64, jobs: Vec<JobElapsed> },
}

// ─────────────────────────────────────────────────────────────────────────────
// JobStore
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct StoreInner {
    jobs: HashMap<String, Job>,
    next_seq: u64,
}

pub struct JobStore {
    inner: RwLock<StoreInner>,
    events: broadcast::Sender<JobEvent>,
}

impl JobStore {
    pub fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            inner: RwLock::new(StoreInner::default()),
            events,
        }
    }

    /// Builds and inserts a new record in `processing` status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::EmptyWorkList` if the job has no items.
    pub fn create(&self, account_id: &str, spec: NewJob) -> Result<Job, AppError> {
        if spec.items.is_empty() {
            return Err(AppError::EmptyWorkList);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let job = {
            let mut guard = self.inner.write();
            let seq = guard.next_seq;
            guard.next_seq += 1;

            let mut job = Job::new(id.clone(), account_id.to_string(), spec, seq, now_ms());
            job.start();
            guard.jobs.insert(id, job.clone());
            job
        };

        self.publish(JobEvent::Created {
            job: job.progress_snapshot(),
        });
        Ok(job)
    }

    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.inner.read().jobs.get(job_id).cloned()
    }

    /// The job an account page should display.
    ///
    /// Prefers a processing or paused job; otherwise falls back to the most
    /// recently created one so the last result stays visible after completion.
    pub fn find_active(&self, account_id: &str, kind: Option<JobKind>) -> Option<Job> {
        let guard = self.inner.read();
        let candidates = guard
            .jobs
            .values()
            .filter(|job| job.account_id == account_id)
            .filter(|job| kind.map_or(true, |k| job.kind == k));

        let mut latest: Option<&Job> = None;
        let mut active: Option<&Job> = None;
        for job in candidates {
            if job.status.is_active() && active.map_or(true, |a| job.seq > a.seq) {
                active = Some(job);
            }
            if latest.map_or(true, |l| job.seq > l.seq) {
                latest = Some(job);
            }
        }

        active.or(latest).cloned()
    }

    /// Applies `patch` atomically. Subscribers are notified when it returns true.
    ///
    /// # Errors
    ///
    /// Returns `AppError::JobNotFound` for an unknown id.
    pub fn update<F>(&self, job_id: &str, patch: F) -> Result<bool, AppError>
    where
        F: FnOnce(&mut Job) -> bool,
    {
        let snapshot = {
            let mut guard = self.inner.write();
            let job = guard
                .jobs
                .get_mut(job_id)
                .ok_or_else(|| AppError::JobNotFound(job_id.to_string()))?;

            let mut next = job.clone();
            if !patch(&mut next) {
                return Ok(false);
            }
            let snapshot = next.progress_snapshot();
            *job = next;
            snapshot
        };

        self.publish(JobEvent::Updated { job: snapshot });
        Ok(true)
    }

    /// All jobs in creation order.
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.inner.read().jobs.values().cloned().collect();
        jobs.sort_by_key(|job| job.seq);
        jobs
    }

    /// Processing or paused jobs in creation order.
    pub fn list_active(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .inner
            .read()
            .jobs
            .values()
            .filter(|job| job.status.is_active())
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.seq);
        jobs
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Sends an event; having no subscribers is not an error.
    pub(crate) fn publish(&self, event: JobEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::model::{ItemResult, JobStatus};
    use serde_json::json;
    use std::sync::Arc;

    fn spec(kind: JobKind, items: usize) -> NewJob {
        NewJob {
            kind,
            title: format!("{} job", kind.as_str()),
            items: Arc::new((0..items).map(|i| json!(i)).collect()),
            batch_size: 1,
            delay_ms: 0,
        }
    }

    #[test]
    fn create_rejects_empty_work_list() {
        let store = JobStore::new(16);
        let result = store.create("acct", spec(JobKind::Import, 0));
        assert!(matches!(result, Err(AppError::EmptyWorkList)));
        assert!(store.list().is_empty());
    }

    #[test]
    fn create_starts_processing_with_clean_counters() {
        let store = JobStore::new(16);
        let job = store.create("acct", spec(JobKind::Import, 3)).unwrap();

        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.total_items, 3);
        assert_eq!(job.processed_items, 0);
        assert!(job.results.is_empty());
        assert_eq!(job.total_paused_ms, 0);
        assert!(job.end_time.is_none());
        assert_eq!(store.get(&job.id).unwrap().id, job.id);
    }

    #[test]
    fn find_active_prefers_running_then_latest() {
        let store = JobStore::new(16);
        let first = store.create("acct", spec(JobKind::Import, 1)).unwrap();
        let second = store.create("acct", spec(JobKind::Import, 1)).unwrap();
        store.create("other", spec(JobKind::Import, 1)).unwrap();

        // Second finishes; first is still processing.
        store
            .update(&second.id, |job| job.finish(JobStatus::Completed, 1))
            .unwrap();
        assert_eq!(store.find_active("acct", None).unwrap().id, first.id);

        // Everything done: most recently created wins.
        store
            .update(&first.id, |job| job.finish(JobStatus::Stopped, 1))
            .unwrap();
        assert_eq!(store.find_active("acct", None).unwrap().id, second.id);

        assert!(store.find_active("nobody", None).is_none());
    }

    #[test]
    fn find_active_filters_by_kind() {
        let store = JobStore::new(16);
        let import = store.create("acct", spec(JobKind::Import, 1)).unwrap();
        let send = store.create("acct", spec(JobKind::Send, 1)).unwrap();

        assert_eq!(
            store.find_active("acct", Some(JobKind::Import)).unwrap().id,
            import.id
        );
        assert_eq!(
            store.find_active("acct", Some(JobKind::Send)).unwrap().id,
            send.id
        );
    }

    #[test]
    fn update_unknown_job_is_not_found() {
        let store = JobStore::new(16);
        let result = store.update("missing", |_| true);
        assert!(matches!(result, Err(AppError::JobNotFound(id)) if id == "missing"));
    }

    #[test]
    fn rejected_patch_leaves_record_untouched() {
        let store = JobStore::new(16);
        let job = store.create("acct", spec(JobKind::Send, 1)).unwrap();
        let mut rx = store.subscribe();

        let changed = store
            .update(&job.id, |job| {
                job.title = "mutated".into();
                false
            })
            .unwrap();

        assert!(!changed);
        assert_eq!(store.get(&job.id).unwrap().title, "send job");
        assert!(rx.try_recv().is_err(), "no event for a no-op patch");
    }

    #[tokio::test]
    async fn subscribers_see_creation_and_updates() {
        let store = JobStore::new(16);
        let mut rx = store.subscribe();

        let job = store.create("acct", spec(JobKind::Import, 2)).unwrap();
        store
            .update(&job.id, |job| job.record(ItemResult::success(1, json!("ok"))))
            .unwrap();

        match rx.recv().await.unwrap() {
            JobEvent::Created { job: progress } => assert_eq!(progress.id, job.id),
            other => panic!("expected Created, got {:?}", other),
        }
        match rx.recv().await.unwrap() {
            JobEvent::Updated { job: progress } => {
                assert_eq!(progress.processed_items, 1);
                assert_eq!(progress.latest_result.unwrap().index, 1);
            }
            other => panic!("expected Updated, got {:?}", other),
        }
    }

    #[test]
    fn list_is_in_creation_order() {
        let store = JobStore::new(16);
        let ids: Vec<String> = (0..5)
            .map(|_| store.create("acct", spec(JobKind::Import, 1)).unwrap().id)
            .collect();
        let listed: Vec<String> = store.list().into_iter().map(|j| j.id).collect();
        assert_eq!(listed, ids);

        store
            .update(&ids[2], |job| job.finish(JobStatus::Completed, 1))
            .unwrap();
        assert_eq!(store.list_active().len(), 4);
    }
}
