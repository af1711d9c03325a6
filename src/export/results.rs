//! Job results to CSV.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::AppError;
use crate::export::atomic_file::AtomicCsvFile;
use crate::jobs::{short_id, ItemResult, Job};

const HEADER: [&str; 5] = ["index", "status", "item", "data", "error"];

/// Which results to write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFilter {
    #[default]
    All,
    Successes,
    Errors,
}

impl ExportFilter {
    fn includes(&self, result: &ItemResult) -> bool {
        match self {
            ExportFilter::All => true,
            ExportFilter::Successes => result.is_success(),
            ExportFilter::Errors => !result.is_success(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub path: PathBuf,
    /// Data rows written, header excluded.
    pub rows: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Writes the selected results of `job` to `path`, replacing any existing file.
///
/// Works on any job state, so a stopped job exports what it finished.
///
/// # Errors
///
/// Returns `AppError::ExportFailed` on any I/O problem; the destination is
/// left untouched in that case.
pub async fn export_results(
    job: Job,
    path: impl Into<PathBuf>,
    filter: ExportFilter,
) -> Result<ExportSummary, AppError> {
    let path = path.into();
    tokio::task::spawn_blocking(move || write_results(&job, path, filter))
        .await
        .map_err(|e| AppError::Internal(format!("Export task failed: {}", e)))?
}

fn write_results(job: &Job, path: PathBuf, filter: ExportFilter) -> Result<ExportSummary, AppError> {
    let mut file = AtomicCsvFile::create(&path)?;
    file.write_row(HEADER)?;

    let mut succeeded = 0;
    let mut failed = 0;
    for result in job.results.iter().filter(|r| filter.includes(r)) {
        if result.is_success() {
            succeeded += 1;
        } else {
            failed += 1;
        }

        let item = result
            .index
            .checked_sub(1)
            .and_then(|i| job.data.get(i))
            .map(cell)
            .unwrap_or_default();
        let data = result.data.as_ref().map(cell).unwrap_or_default();
        let error = result.error.clone().unwrap_or_default();

        file.write_row([
            result.index.to_string(),
            result.status.as_str().to_string(),
            item,
            data,
            error,
        ])?;
    }

    let rows = file.rows_written() - 1;
    let path = file.commit()?;

    info!(
        "[JOB-EXPORT] Job {} exported {} rows to {}",
        short_id(&job.id),
        rows,
        path.display()
    );

    Ok(ExportSummary {
        path,
        rows,
        succeeded,
        failed,
    })
}

/// Strings go out bare; everything else as compact JSON.
fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
