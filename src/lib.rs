//! Client-side bulk job engine for the email-marketing console.
//!
//! Imports and sends run as background jobs that process one work item at a
//! time, can be paused, resumed and stopped, and report progress to any number
//! of subscribers.

pub mod commands;
pub mod drafts;
pub mod error;
pub mod export;
pub mod jobs;
pub mod state;
pub mod validation;

pub use error::{AppError, ErrorPresentation};
pub use jobs::{
    processor_fn, ItemError, ItemProcessor, Job, JobConfig, JobEngine, JobEvent, JobKind,
    JobStatus, JobView,
};
pub use state::AppState;
