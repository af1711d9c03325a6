//! Bulk job engine: store, runner, control signals and clock.

pub mod clock;
pub mod config;
pub mod elapsed;
pub mod engine;
pub mod model;
pub mod processor;
pub mod signals;
pub mod store;

mod runner;

pub use clock::ClockHandle;
pub use config::EngineConfig;
pub use elapsed::{elapsed_secs, format_elapsed};
pub use engine::JobEngine;
pub use model::{ItemResult, ItemStatus, Job, JobKind, JobProgress, JobStatus, JobView, NewJob, WorkItem};
pub use processor::{processor_fn, ItemError, ItemProcessor, JobConfig};
pub use store::{JobElapsed, JobEvent, JobStore};

/// First 8 characters of an id, for log lines.
pub(crate) fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
