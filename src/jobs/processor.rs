//! The seam between the engine and a vendor adapter.
//!
//! The engine never knows which vendor it talks to: every adapter implements
//! [`ItemProcessor`] and the runner drives work items through it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::error::{sanitize_message, AppError};
use crate::jobs::model::{JobKind, WorkItem};

/// Future returned by [`ItemProcessor::process_item`].
pub type ProcessFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, ItemError>> + Send + 'a>>;

/// Future returned by [`ItemProcessor::prepare`].
pub type PrepareFuture<'a> = Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>>;

/// Rejection of a single item. The message is shown to operators as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ItemError {
    message: String,
}

impl ItemError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Message with credentials scrubbed, safe to store in results.
    pub fn display_message(&self) -> String {
        sanitize_message(&self.message, "Request failed (details hidden)")
    }
}

impl From<String> for ItemError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ItemError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<AppError> for ItemError {
    fn from(err: AppError) -> Self {
        Self::new(err.to_presentation().message)
    }
}

/// Performs one unit of work against an external service.
pub trait ItemProcessor: Send + Sync {
    /// Processes one item. Called at most once per item per run.
    fn process_item(&self, item: WorkItem) -> ProcessFuture<'_>;

    /// Runs once before the first item. An error fails the whole job.
    fn prepare(&self) -> PrepareFuture<'_> {
        Box::pin(async { Ok(()) })
    }
}

/// Adapts an async closure into an [`ItemProcessor`].
pub struct FnProcessor<F> {
    f: F,
}

impl<F, Fut> ItemProcessor for FnProcessor<F>
where
    F: Fn(WorkItem) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ItemError>> + Send + 'static,
{
    fn process_item(&self, item: WorkItem) -> ProcessFuture<'_> {
        Box::pin((self.f)(item))
    }
}

/// Wraps `f` as a shareable processor.
pub fn processor_fn<F, Fut>(f: F) -> Arc<dyn ItemProcessor>
where
    F: Fn(WorkItem) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ItemError>> + Send + 'static,
{
    Arc::new(FnProcessor { f })
}

// ─────────────────────────────────────────────────────────────────────────────
// JobConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Caller-supplied description of a job.
#[derive(Clone)]
pub struct JobConfig {
    pub kind: JobKind,
    pub title: String,
    pub items: Vec<WorkItem>,
    pub batch_size: usize,
    /// Inter-item delay; `None` uses the engine default.
    pub delay: Option<std::time::Duration>,
    pub processor: Arc<dyn ItemProcessor>,
}

impl JobConfig {
    pub fn new(
        kind: JobKind,
        title: impl Into<String>,
        items: Vec<WorkItem>,
        processor: Arc<dyn ItemProcessor>,
    ) -> Self {
        Self {
            kind,
            title: title.into(),
            items,
            batch_size: 1,
            delay: None,
            processor,
        }
    }

    pub fn delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

impl std::fmt::Debug for JobConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobConfig")
            .field("kind", &self.kind)
            .field("title", &self.title)
            .field("items", &self.items.len())
            .field("batch_size", &self.batch_size)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn closure_processor_resolves_and_rejects() {
        let processor = processor_fn(|item: WorkItem| async move {
            match item.get("email").and_then(Value::as_str) {
                Some(email) => Ok(json!({ "imported": email })),
                None => Err(ItemError::from("missing email")),
            }
        });

        let ok = processor
            .process_item(json!({ "email": "a@example.com" }))
            .await
            .unwrap();
        assert_eq!(ok, json!({ "imported": "a@example.com" }));

        let err = processor.process_item(json!({})).await.unwrap_err();
        assert_eq!(err.message(), "missing email");
        assert!(processor.prepare().await.is_ok());
    }

    #[test]
    fn display_message_hides_credentials() {
        let err = ItemError::new("401: invalid api_key sk-123");
        assert_eq!(err.display_message(), "Request failed (details hidden)");
        assert_eq!(ItemError::new("Contact already exists").display_message(), "Contact already exists");
    }

    #[test]
    fn config_builder_sets_fields() {
        let processor = processor_fn(|_| async { Ok::<_, ItemError>(Value::Null) });
        let config = JobConfig::new(JobKind::Send, "Campaign", vec![json!(1)], processor)
            .delay(std::time::Duration::from_secs(2))
            .batch_size(3);
        assert_eq!(config.batch_size, 3);
        assert_eq!(config.delay, Some(std::time::Duration::from_secs(2)));
        assert!(format!("{:?}", config).contains("Campaign"));
    }
}
