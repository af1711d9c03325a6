//! Session-scoped form drafts.
//!
//! The console echoes pending job input (pasted text, chosen target, field
//! settings) here so a reload does not lose it. The engine never reads drafts.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::jobs::model::now_ms;
use crate::jobs::JobKind;

/// Storage key for a draft: one per job kind and account.
pub fn draft_key(kind: JobKind, account_id: &str) -> String {
    format!("bulk-draft:{}:{}", kind.as_str(), account_id.trim())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub raw_text: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub settings: Map<String, Value>,
    pub updated_at: i64,
}

#[derive(Debug, Default)]
pub struct DraftStore {
    drafts: RwLock<BTreeMap<String, Draft>>,
}

impl DraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves (or overwrites) the draft under `key`, stamped with the current time.
    pub fn save(
        &self,
        key: impl Into<String>,
        raw_text: impl Into<String>,
        target: Option<String>,
        settings: Map<String, Value>,
    ) -> Draft {
        let draft = Draft {
            raw_text: raw_text.into(),
            target,
            settings,
            updated_at: now_ms(),
        };
        self.drafts.write().insert(key.into(), draft.clone());
        draft
    }

    pub fn load(&self, key: &str) -> Option<Draft> {
        self.drafts.read().get(key).cloned()
    }

    /// Returns true if a draft was removed.
    pub fn clear(&self, key: &str) -> bool {
        self.drafts.write().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.drafts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.read().is_empty()
    }

    /// Serializes every draft, for handing to session storage.
    pub fn to_json(&self) -> Result<String, AppError> {
        serde_json::to_string(&*self.drafts.read())
            .map_err(|e| AppError::Internal(format!("Failed to serialize drafts: {}", e)))
    }

    /// Replaces the contents with drafts previously produced by `to_json`.
    ///
    /// On a parse error the existing drafts are kept.
    pub fn restore_json(&self, json: &str) -> Result<usize, AppError> {
        let restored: BTreeMap<String, Draft> = serde_json::from_str(json)
            .map_err(|e| AppError::InvalidInput(format!("Unreadable drafts: {}", e)))?;
        let count = restored.len();
        *self.drafts.write() = restored;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> Map<String, Value> {
        match json!({ "sendAt": "now", "trackOpens": true }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn keys_separate_kind_and_account() {
        assert_eq!(draft_key(JobKind::Import, "acct-1"), "bulk-draft:import:acct-1");
        assert_ne!(draft_key(JobKind::Import, "a"), draft_key(JobKind::Send, "a"));
        assert_eq!(draft_key(JobKind::Send, " a "), draft_key(JobKind::Send, "a"));
    }

    #[test]
    fn save_load_clear() {
        let store = DraftStore::new();
        let key = draft_key(JobKind::Send, "acct");
        assert!(store.load(&key).is_none());

        let saved = store.save(&key, "a@example.com", Some("list-9".into()), settings());
        assert!(saved.updated_at > 0);
        assert_eq!(store.load(&key), Some(saved));

        let replaced = store.save(&key, "b@example.com", None, Map::new());
        assert_eq!(store.load(&key).map(|d| d.raw_text), Some("b@example.com".into()));
        assert!(replaced.target.is_none());
        assert_eq!(store.len(), 1);

        assert!(store.clear(&key));
        assert!(!store.clear(&key));
        assert!(store.is_empty());
    }

    #[test]
    fn json_echo_restores_everything() {
        let store = DraftStore::new();
        store.save("one", "x@example.com", Some("t".into()), settings());
        store.save("two", "y@example.com", None, Map::new());
        let json = store.to_json().unwrap();
        assert!(json.contains("\"rawText\""));

        let restored = DraftStore::new();
        assert_eq!(restored.restore_json(&json).unwrap(), 2);
        assert_eq!(restored.load("one"), store.load("one"));
        assert_eq!(restored.load("two"), store.load("two"));
    }

    #[test]
    fn bad_json_keeps_existing_drafts() {
        let store = DraftStore::new();
        store.save("keep", "z@example.com", None, Map::new());
        let err = store.restore_json("{not json").unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(store.load("keep").is_some());
    }
}
