//! Draft commands: the console's pending form input, per account and job kind.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::commands::resolve_account;
use crate::drafts::{draft_key, Draft};
use crate::error::AppError;
use crate::jobs::JobKind;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDraftRequest {
    pub kind: JobKind,
    #[serde(default)]
    pub account_id: Option<String>,
    pub raw_text: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

pub async fn save_draft(state: &AppState, req: SaveDraftRequest) -> Result<Draft, AppError> {
    let account_id = resolve_account(state, req.account_id).await?;
    Ok(state.drafts.save(
        draft_key(req.kind, &account_id),
        req.raw_text,
        req.target,
        req.settings,
    ))
}

pub async fn load_draft(
    state: &AppState,
    kind: JobKind,
    account_id: Option<String>,
) -> Result<Option<Draft>, AppError> {
    let account_id = resolve_account(state, account_id).await?;
    Ok(state.drafts.load(&draft_key(kind, &account_id)))
}

/// Drops the draft, typically once its job has started. Returns false if
/// there was none.
pub async fn clear_draft(
    state: &AppState,
    kind: JobKind,
    account_id: Option<String>,
) -> Result<bool, AppError> {
    let account_id = resolve_account(state, account_id).await?;
    Ok(state.drafts.clear(&draft_key(kind, &account_id)))
}
