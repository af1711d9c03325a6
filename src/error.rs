use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Patterns (lowercase) that indicate sensitive data not safe for UI display.
/// Used by `contains_sensitive()` for case-insensitive matching.
pub(crate) const SENSITIVE_PATTERNS: &[&str] = &[
    "bearer ",
    "api_key",
    "api-key",
    "apikey",
    "access_token",
    "authorization:",
];

/// Returns true if the message contains any sensitive pattern (case-insensitive).
fn contains_sensitive(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Sanitizes a message for UI display.
/// If sensitive content is detected, returns the fallback instead.
pub(crate) fn sanitize_message(msg: &str, fallback: &str) -> String {
    if contains_sensitive(msg) {
        fallback.into()
    } else {
        msg.to_string()
    }
}

/// User-friendly error presentation for the frontend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPresentation {
    pub title: String,
    pub message: String,
    pub action: Option<String>,
}

/// Application-wide error type.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Accounts ──────────────────────────────────────────────────────────────
    #[error("No active account selected")]
    NoActiveAccount,

    // ── Job configuration ─────────────────────────────────────────────────────
    #[error("Work list is empty")]
    EmptyWorkList,

    #[error("Invalid job configuration: {0}")]
    InvalidJobConfig(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    // ── Job execution ─────────────────────────────────────────────────────────
    #[error("Job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    // ── Input ─────────────────────────────────────────────────────────────────
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid CSV: {0}")]
    CsvInvalid(String),

    // ── Export ────────────────────────────────────────────────────────────────
    #[error("Export failed: {0}")]
    ExportFailed(String),

    // ── Generic fallback ──────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Converts the error into a user-friendly presentation suitable for UI display.
    /// Never leaks API keys, tokens or authorization headers.
    pub fn to_presentation(&self) -> ErrorPresentation {
        match self {
            AppError::NoActiveAccount => ErrorPresentation {
                title: "No Account Selected".into(),
                message: "Select an account before starting a bulk operation.".into(),
                action: Some("Select an account".into()),
            },

            AppError::EmptyWorkList => ErrorPresentation {
                title: "Nothing To Process".into(),
                message: "The job has no items. Paste at least one contact and try again.".into(),
                action: Some("Add contacts".into()),
            },

            AppError::InvalidJobConfig(msg) => ErrorPresentation {
                title: "Invalid Job Settings".into(),
                message: sanitize_message(msg, "The job settings are invalid."),
                action: Some("Review the job settings".into()),
            },

            AppError::JobNotFound(_) => ErrorPresentation {
                title: "Job Not Found".into(),
                message: "The requested job no longer exists.".into(),
                action: None,
            },

            AppError::JobFailed { job_id: _, message } => ErrorPresentation {
                title: "Bulk Job Failed".into(),
                message: sanitize_message(message, "The bulk operation failed."),
                action: Some("Review the error and try again".into()),
            },

            AppError::InvalidInput(msg) => ErrorPresentation {
                title: "Invalid Input".into(),
                message: sanitize_message(msg, "The input could not be read."),
                action: Some("Fix the input and try again".into()),
            },

            AppError::CsvInvalid(msg) => ErrorPresentation {
                title: "Invalid CSV".into(),
                message: format!(
                    "The CSV data has a formatting problem: {}",
                    sanitize_message(msg, "details hidden")
                ),
                action: Some("Fix the CSV data and try again".into()),
            },

            AppError::ExportFailed(_) => ErrorPresentation {
                title: "Export Failed".into(),
                message: "The results could not be written to disk.".into(),
                action: Some("Choose another location and try again".into()),
            },

            AppError::Internal(_) => ErrorPresentation {
                title: "Unexpected Error".into(),
                message: "Something went wrong. Please try again.".into(),
                action: Some("Try again".into()),
            },
        }
    }
}

// Commands return AppError straight to the UI layer.
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_presentation().serialize(serializer)
    }
}
