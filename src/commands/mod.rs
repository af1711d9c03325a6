//! Command handlers the console calls into.

pub mod drafts;
pub mod jobs;

pub use drafts::*;
pub use jobs::*;

use crate::error::AppError;
use crate::state::AppState;

/// The given account, or the active one when none is given.
///
/// # Errors
/// - `AppError::NoActiveAccount` if neither is set
pub(crate) async fn resolve_account(
    state: &AppState,
    account_id: Option<String>,
) -> Result<String, AppError> {
    let given = account_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());
    match given {
        Some(id) => Ok(id),
        None => state
            .get_active_account_id()
            .await
            .ok_or(AppError::NoActiveAccount),
    }
}
