//! Application state shared by the command handlers.

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::drafts::DraftStore;
use crate::jobs::{EngineConfig, JobEngine};

// ─────────────────────────────────────────────────────────────────────────────
// Application State
// ─────────────────────────────────────────────────────────────────────────────

/// Built once at application start and handed to every command.
pub struct AppState {
    pub engine: Arc<JobEngine>,
    pub drafts: DraftStore,
    /// Account the console is currently working in, if any.
    pub active_account_id: RwLock<Option<String>>,
}

impl AppState {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            engine: Arc::new(JobEngine::new(config)),
            drafts: DraftStore::new(),
            active_account_id: RwLock::new(None),
        }
    }

    pub async fn get_active_account_id(&self) -> Option<String> {
        self.active_account_id.read().await.clone()
    }

    pub async fn set_active_account_id(&self, account_id: Option<String>) {
        *self.active_account_id.write().await = account_id;
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
