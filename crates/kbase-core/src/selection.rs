//! Selection state for bulk destructive actions.
//!
//! The selection set lives with the client session and is never persisted.
//! [`BulkOutcome`] classifies the result of a bulk request so the caller can
//! update its visible list and notify the user.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::BulkDeleteResponse;

/// Ids selected for a bulk action, plus whether select mode is active.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    active: bool,
    ids: BTreeSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter select mode with an empty set.
    pub fn enter(&mut self) {
        self.active = true;
        self.ids.clear();
    }

    /// Leave select mode and clear the set.
    pub fn exit(&mut self) {
        self.active = false;
        self.ids.clear();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Add or remove `id`. Returns true when the id is selected afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }

    /// Add `id`; selecting an already-selected id is a no-op.
    pub fn insert(&mut self, id: &str) {
        self.ids.insert(id.to_string());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Selected ids in stable order.
    pub fn ids(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }
}

/// Classification of a destructive action's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BulkOutcome {
    /// Every requested id was deleted.
    Success { removed: Vec<String> },
    /// Some ids were deleted; `failed` are still present.
    Partial {
        removed: Vec<String>,
        failed: Vec<String>,
    },
    /// Nothing was deleted.
    Failed { failed: Vec<String>, error: String },
}

impl BulkOutcome {
    /// Classify a partitioned bulk delete response.
    pub fn from_response(resp: &BulkDeleteResponse) -> Self {
        let removed: Vec<String> = resp.succeeded.iter().map(|s| s.channel_id.clone()).collect();
        let failed: Vec<String> = resp.failed.iter().map(|f| f.channel_id.clone()).collect();

        match (removed.is_empty(), failed.is_empty()) {
            (_, true) => BulkOutcome::Success { removed },
            (false, false) => BulkOutcome::Partial { removed, failed },
            (true, false) => {
                let error = resp
                    .failed
                    .first()
                    .map(|f| f.error.clone())
                    .unwrap_or_else(|| resp.message.clone());
                BulkOutcome::Failed { failed, error }
            }
        }
    }

    /// Ids removed from the backing store.
    pub fn removed(&self) -> &[String] {
        match self {
            BulkOutcome::Success { removed } | BulkOutcome::Partial { removed, .. } => removed,
            BulkOutcome::Failed { .. } => &[],
        }
    }

    /// Ids still present after the action.
    pub fn failed(&self) -> &[String] {
        match self {
            BulkOutcome::Success { .. } => &[],
            BulkOutcome::Partial { failed, .. } | BulkOutcome::Failed { failed, .. } => failed,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, BulkOutcome::Partial { .. })
    }
}

/// Client-visible list of items that a destructive action removes from.
pub trait VisibleItem {
    fn item_id(&self) -> &str;
}

impl VisibleItem for String {
    fn item_id(&self) -> &str {
        self
    }
}

/// Remove exactly the ids in `removed` from `items`, keeping order.
pub fn remove_ids<T: VisibleItem>(items: &mut Vec<T>, removed: &[String]) {
    if removed.is_empty() {
        return;
    }
    let removed: BTreeSet<&str> = removed.iter().map(String::as_str).collect();
    items.retain(|item| !removed.contains(item.item_id()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BulkDeleteFailure, BulkDeleteSuccess};

    fn success(id: &str) -> BulkDeleteSuccess {
        BulkDeleteSuccess {
            channel_id: id.to_string(),
            channel_title: format!("Channel {}", id),
            videos_deleted: 1,
            vectors_deleted: 2,
            files_deleted: 1,
        }
    }

    fn failure(id: &str) -> BulkDeleteFailure {
        BulkDeleteFailure {
            channel_id: id.to_string(),
            channel_title: String::new(),
            error: "vector store unavailable".to_string(),
        }
    }

    #[test]
    fn test_selection_enter_toggle_exit() {
        let mut sel = SelectionSet::new();
        sel.insert("stale");
        sel.enter();
        assert!(sel.is_active());
        assert!(sel.is_empty());

        assert!(sel.toggle("a"));
        assert!(sel.toggle("b"));
        assert!(!sel.toggle("a"));
        assert_eq!(sel.ids(), vec!["b".to_string()]);

        sel.exit();
        assert!(!sel.is_active());
        assert!(sel.is_empty());
    }

    #[test]
    fn test_selection_insert_idempotent() {
        let mut sel = SelectionSet::new();
        sel.insert("a");
        sel.insert("a");
        assert_eq!(sel.len(), 1);
        assert!(sel.contains("a"));
    }

    #[test]
    fn test_outcome_partial() {
        let resp = BulkDeleteResponse {
            succeeded: vec![success("1"), success("3")],
            failed: vec![failure("2")],
            message: "Deleted 2 of 3".into(),
        };
        let outcome = BulkOutcome::from_response(&resp);
        assert!(outcome.is_partial());
        assert_eq!(outcome.removed(), &["1".to_string(), "3".to_string()]);
        assert_eq!(outcome.failed(), &["2".to_string()]);

        let mut visible: Vec<String> = vec!["1".into(), "2".into(), "3".into()];
        remove_ids(&mut visible, outcome.removed());
        assert_eq!(visible, vec!["2".to_string()]);
    }

    #[test]
    fn test_outcome_success_and_failed() {
        let ok = BulkDeleteResponse {
            succeeded: vec![success("1")],
            ..Default::default()
        };
        assert_eq!(
            BulkOutcome::from_response(&ok),
            BulkOutcome::Success {
                removed: vec!["1".into()]
            }
        );

        let bad = BulkDeleteResponse {
            failed: vec![failure("1"), failure("2")],
            ..Default::default()
        };
        match BulkOutcome::from_response(&bad) {
            BulkOutcome::Failed { failed, error } => {
                assert_eq!(failed.len(), 2);
                assert_eq!(error, "vector store unavailable");
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let outcome = BulkOutcome::Partial {
            removed: vec!["1".into()],
            failed: vec!["2".into()],
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "partial");
        assert_eq!(json["failed"][0], "2");
    }
}
