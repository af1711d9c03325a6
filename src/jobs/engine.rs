//! Public control API for bulk jobs.
//!
//! ```ignore
//! let engine = JobEngine::new(EngineConfig::default());
//! let job_id = engine.add_job(
//!     JobConfig::new(JobKind::Import, "Import contacts", items, adapter)
//!         .delay(Duration::from_secs(1)),
//!     "account-1",
//! )?;
//!
//! engine.pause_job(&job_id)?;
//! engine.resume_job(&job_id)?;
//! engine.stop_job(&job_id)?;
//! ```
//!
//! Transitions are applied before each call returns; the work itself continues
//! on a background task per job.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::error::AppError;
use crate::jobs::clock::{spawn_clock, ClockHandle};
use crate::jobs::config::EngineConfig;
use crate::jobs::elapsed::elapsed_secs;
use crate::jobs::model::{now_ms, Job, JobKind, JobStatus, JobView, NewJob};
use crate::jobs::processor::JobConfig;
use crate::jobs::runner::JobRunner;
use crate::jobs::short_id;
use crate::jobs::signals::{JobSignals, SignalRegistry};
use crate::jobs::store::{JobEvent, JobStore};

pub struct JobEngine {
    store: Arc<JobStore>,
    signals: Arc<SignalRegistry>,
    config: EngineConfig,
}

impl JobEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            store: Arc::new(JobStore::new(config.channel_capacity())),
            signals: Arc::new(SignalRegistry::new()),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Validates `config`, creates the job and spawns its loop.
    ///
    /// An active job for the same account and kind is stopped first, so each
    /// `(account, kind)` pair has at most one running or paused job.
    ///
    /// # Errors
    ///
    /// - `AppError::EmptyWorkList` if there are no items
    /// - `AppError::InvalidJobConfig` for a blank account or a bad window size
    /// - `AppError::Internal` when called outside a tokio runtime
    pub fn add_job(&self, config: JobConfig, account_id: &str) -> Result<String, AppError> {
        let account_id = account_id.trim();
        if account_id.is_empty() {
            return Err(AppError::InvalidJobConfig("account id is required".into()));
        }
        if config.items.is_empty() {
            return Err(AppError::EmptyWorkList);
        }
        if config.batch_size == 0 || config.batch_size > self.config.max_batch_size {
            return Err(AppError::InvalidJobConfig(format!(
                "batch size must be between 1 and {}",
                self.config.max_batch_size
            )));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AppError::Internal(format!("No async runtime: {}", e)))?;

        if let Some(previous) = self.store.find_active(account_id, Some(config.kind)) {
            if previous.status.is_active() {
                info!(
                    "[JOB-ENGINE] Job {} superseded for account {}",
                    short_id(&previous.id),
                    account_id
                );
                self.stop_job(&previous.id)?;
            }
        }

        let delay = config
            .delay
            .unwrap_or_else(|| Duration::from_millis(self.config.default_delay_ms));
        let items = Arc::new(config.items);

        let job = self.store.create(
            account_id,
            NewJob {
                kind: config.kind,
                title: config.title,
                items: items.clone(),
                batch_size: config.batch_size,
                delay_ms: delay.as_millis() as u64,
            },
        )?;

        let signals = JobSignals::new();
        self.signals.insert(job.id.clone(), signals.clone());

        let runner = JobRunner {
            store: self.store.clone(),
            registry: self.signals.clone(),
            signals,
            processor: config.processor,
            job_id: job.id.clone(),
            items,
            batch_size: job.batch_size,
            delay,
            pause_poll: self.config.pause_poll_interval(),
        };
        runtime.spawn(runner.run());

        info!(
            "[JOB-ENGINE] Job {} ({} \"{}\") queued for account {} with {} items",
            short_id(&job.id),
            job.kind.as_str(),
            job.title,
            account_id,
            job.total_items
        );

        Ok(job.id)
    }

    /// processing → paused. Returns false if the job was not processing.
    pub fn pause_job(&self, job_id: &str) -> Result<bool, AppError> {
        let paused = self.store.update(job_id, |job| job.pause(now_ms()))?;
        if paused {
            if let Some(signals) = self.signals.get(job_id) {
                signals.pause();
            }
            info!("[JOB-ENGINE] Job {} paused", short_id(job_id));
        }
        Ok(paused)
    }

    /// paused → processing. Returns false if the job was not paused.
    pub fn resume_job(&self, job_id: &str) -> Result<bool, AppError> {
        let resumed = self.store.update(job_id, |job| job.resume(now_ms()))?;
        if resumed {
            if let Some(signals) = self.signals.get(job_id) {
                signals.resume();
            }
            info!("[JOB-ENGINE] Job {} resumed", short_id(job_id));
        }
        Ok(resumed)
    }

    /// Stops the job. Idempotent: returns false if it was already terminal.
    ///
    /// The status and `end_time` change now. A request already in flight runs
    /// to the end and its outcome is still recorded.
    pub fn stop_job(&self, job_id: &str) -> Result<bool, AppError> {
        let stopped = self
            .store
            .update(job_id, |job| job.finish(JobStatus::Stopped, now_ms()))?;
        if let Some(signals) = self.signals.get(job_id) {
            signals.cancel();
        }
        if stopped {
            info!("[JOB-ENGINE] Job {} stopped", short_id(job_id));
        }
        Ok(stopped)
    }

    pub fn get_job(&self, job_id: &str) -> Option<Job> {
        self.store.get(job_id)
    }

    pub fn get_job_view(&self, job_id: &str) -> Option<JobView> {
        self.store.get(job_id).map(|job| job.view(now_ms()))
    }

    /// The job an account page should show; see [`JobStore::find_active`].
    pub fn get_active_job_for_account(&self, account_id: &str, kind: Option<JobKind>) -> Option<Job> {
        self.store.find_active(account_id, kind)
    }

    pub fn elapsed_secs(&self, job_id: &str) -> Option<u64> {
        self.store.get(job_id).map(|job| elapsed_secs(&job, now_ms()))
    }

    pub fn list_jobs(&self) -> Vec<Job> {
        self.store.list()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.store.subscribe()
    }

    /// Starts the elapsed-time ticker at the configured period.
    pub fn start_clock(&self) -> ClockHandle {
        spawn_clock(self.store.clone(), self.config.tick_period())
    }

    /// Number of job loops still running.
    pub fn running_loops(&self) -> usize {
        self.signals.len()
    }

    /// Stops every active job. Used when the owning context is torn down.
    pub fn shutdown(&self) {
        for job in self.store.list_active() {
            if let Err(e) = self.stop_job(&job.id) {
                warn!("[JOB-ENGINE] Could not stop job {}: {}", short_id(&job.id), e);
            }
        }
        let cancelled = self.signals.cancel_all();
        info!("[JOB-ENGINE] Shutdown signalled {} job loops", cancelled);
    }
}

impl Default for JobEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
