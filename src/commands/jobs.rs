//! Bulk job commands: start, control, inspect and export.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::commands::resolve_account;
use crate::error::AppError;
use crate::export::{export_results, ExportFilter, ExportSummary};
use crate::jobs::{short_id, ItemProcessor, JobConfig, JobKind, JobView, WorkItem};
use crate::state::AppState;
use crate::validation::{parse_csv_rows, parse_email_list, DEFAULT_EMAIL_COLUMN};

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Where the work list comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum JobInput {
    /// Items built by the caller.
    Items { items: Vec<WorkItem> },
    /// Pasted addresses, one `{"email": ..}` item each.
    #[serde(rename_all = "camelCase")]
    EmailList { raw_text: String },
    /// CSV text, one object per row.
    #[serde(rename_all = "camelCase")]
    CsvRows {
        text: String,
        #[serde(default)]
        email_column: Option<String>,
    },
}

/// Request to start a bulk job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartJobRequest {
    /// Falls back to the active account when absent.
    #[serde(default)]
    pub account_id: Option<String>,
    pub kind: JobKind,
    pub title: String,
    pub input: JobInput,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub delay_ms: Option<u64>,
}

/// Response when a job has been queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStarted {
    pub job_id: String,
    pub account_id: String,
    pub total_items: usize,
    /// Entries dropped while building the work list (invalid or bad rows).
    pub rejected: usize,
    /// Entries dropped as repeats of an earlier address.
    pub duplicates: usize,
}

struct WorkList {
    items: Vec<WorkItem>,
    rejected: usize,
    duplicates: usize,
}

fn build_work_list(input: JobInput) -> Result<WorkList, AppError> {
    match input {
        JobInput::Items { items } => Ok(WorkList {
            items,
            rejected: 0,
            duplicates: 0,
        }),
        JobInput::EmailList { raw_text } => {
            let parsed = parse_email_list(&raw_text);
            Ok(WorkList {
                items: parsed.to_work_items(),
                rejected: parsed.invalid.len(),
                duplicates: parsed.duplicates,
            })
        }
        JobInput::CsvRows { text, email_column } => {
            let column = email_column.as_deref().unwrap_or(DEFAULT_EMAIL_COLUMN);
            let parsed = parse_csv_rows(&text, column)?;
            let rejected = (parsed.stats.rows_read - parsed.stats.rows_accepted) as usize;
            let duplicates = parsed.stats.duplicates as usize;
            Ok(WorkList {
                items: parsed.items,
                rejected: rejected - duplicates,
                duplicates,
            })
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Builds the work list and queues a job on the engine.
///
/// Entries that fail validation are skipped and counted; the job runs over
/// what is left. Any active job for the same account and kind is stopped.
///
/// # Errors
///
/// - `AppError::NoActiveAccount` if no account is given or selected
/// - `AppError::EmptyWorkList` if nothing valid remains
/// - `AppError::CsvInvalid` for CSV text without a usable header
/// - `AppError::InvalidJobConfig` for a bad batch size
pub async fn start_bulk_job(
    state: &AppState,
    req: StartJobRequest,
    processor: Arc<dyn ItemProcessor>,
) -> Result<JobStarted, AppError> {
    let account_id = resolve_account(state, req.account_id).await?;
    let work = build_work_list(req.input)?;
    if work.items.is_empty() {
        return Err(AppError::EmptyWorkList);
    }
    let total_items = work.items.len();

    let mut config = JobConfig::new(req.kind, req.title, work.items, processor);
    if let Some(batch_size) = req.batch_size {
        config = config.batch_size(batch_size);
    }
    if let Some(delay_ms) = req.delay_ms {
        config = config.delay(Duration::from_millis(delay_ms));
    }

    let job_id = state.engine.add_job(config, &account_id)?;

    if work.rejected > 0 || work.duplicates > 0 {
        info!(
            "[JOB-COMMANDS] Job {} skipped {} rejected and {} duplicate entries",
            short_id(&job_id),
            work.rejected,
            work.duplicates
        );
    }

    Ok(JobStarted {
        job_id,
        account_id,
        total_items,
        rejected: work.rejected,
        duplicates: work.duplicates,
    })
}

pub async fn pause_bulk_job(state: &AppState, job_id: String) -> Result<bool, AppError> {
    state.engine.pause_job(&job_id)
}

pub async fn resume_bulk_job(state: &AppState, job_id: String) -> Result<bool, AppError> {
    state.engine.resume_job(&job_id)
}

/// Stops a job. Calling it again, or on a finished job, is a no-op.
pub async fn stop_bulk_job(state: &AppState, job_id: String) -> Result<bool, AppError> {
    state.engine.stop_job(&job_id)
}

pub async fn get_job_view(state: &AppState, job_id: String) -> Result<JobView, AppError> {
    state
        .engine
        .get_job_view(&job_id)
        .ok_or(AppError::JobNotFound(job_id))
}

/// The job an account page should show: its running or paused job if it has
/// one, otherwise its most recent job.
pub async fn get_active_job(
    state: &AppState,
    account_id: Option<String>,
    kind: Option<JobKind>,
) -> Result<Option<JobView>, AppError> {
    let account_id = resolve_account(state, account_id).await?;
    Ok(state
        .engine
        .get_active_job_for_account(&account_id, kind)
        .and_then(|job| state.engine.get_job_view(&job.id)))
}

/// Writes a job's results to a CSV file at `path`.
pub async fn export_job_results(
    state: &AppState,
    job_id: String,
    path: String,
    filter: Option<ExportFilter>,
) -> Result<ExportSummary, AppError> {
    let job = state
        .engine
        .get_job(&job_id)
        .ok_or(AppError::JobNotFound(job_id))?;
    export_results(job, PathBuf::from(path), filter.unwrap_or_default()).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
