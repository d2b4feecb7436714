//! Single and bulk destructive-action flow.
//!
//! Owns the visible item list and the selection set for one list view, and
//! applies delete results to both. Deletes go through a [`DeleteTarget`].

use std::sync::Arc;

use tracing::{info, warn};

use kbase_core::selection::{remove_ids, VisibleItem};
use kbase_core::{BulkOutcome, DeleteTarget, Error, Result, SelectionSet};

/// A single delete awaiting user confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConfirmation {
    pub id: String,
    /// Dependent records removed along with the item.
    pub dependent_count: i64,
}

/// A bulk delete awaiting user confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBulk {
    pub ids: Vec<String>,
}

pub struct DeleteFlow<I: VisibleItem> {
    target: Arc<dyn DeleteTarget>,
    items: Vec<I>,
    selection: SelectionSet,
}

impl<I: VisibleItem> DeleteFlow<I> {
    pub fn new(target: Arc<dyn DeleteTarget>, items: Vec<I>) -> Self {
        Self {
            target,
            items,
            selection: SelectionSet::new(),
        }
    }

    pub fn items(&self) -> &[I] {
        &self.items
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionSet {
        &mut self.selection
    }

    /// Fetch the dependent count for the confirmation warning.
    pub async fn request_single(&self, id: &str) -> Result<PendingConfirmation> {
        let dependent_count = self.target.dependent_count(id).await?;
        Ok(PendingConfirmation {
            id: id.to_string(),
            dependent_count,
        })
    }

    /// Delete a confirmed item. A 404 means it is already gone and counts
    /// as success.
    pub async fn confirm(&mut self, pending: PendingConfirmation) -> BulkOutcome {
        let id = pending.id;
        let outcome = match self.target.delete_one(&id).await {
            Ok(()) => BulkOutcome::Success { removed: vec![id] },
            Err(e) if e.is_not_found() => {
                info!(subsystem = "jobs", component = "delete_flow", id = %id, "Item already deleted");
                BulkOutcome::Success { removed: vec![id] }
            }
            Err(e) => {
                warn!(subsystem = "jobs", component = "delete_flow", id = %id, error = %e, "Delete failed");
                BulkOutcome::Failed {
                    failed: vec![id],
                    error: e.to_string(),
                }
            }
        };
        self.finish(&outcome);
        outcome
    }

    /// Snapshot the current selection for confirmation.
    pub fn request_bulk(&self) -> Result<PendingBulk> {
        if self.selection.is_empty() {
            return Err(Error::InvalidInput("No items selected".to_string()));
        }
        Ok(PendingBulk {
            ids: self.selection.ids(),
        })
    }

    /// Delete every confirmed id in one request.
    pub async fn confirm_bulk(&mut self, pending: PendingBulk) -> BulkOutcome {
        let outcome = match self.target.delete_many(&pending.ids).await {
            Ok(resp) => BulkOutcome::from_response(&resp),
            Err(e) => {
                warn!(
                    subsystem = "jobs",
                    component = "delete_flow",
                    count = pending.ids.len(),
                    error = %e,
                    "Bulk delete failed"
                );
                BulkOutcome::Failed {
                    failed: pending.ids,
                    error: e.to_string(),
                }
            }
        };
        self.finish(&outcome);
        outcome
    }

    fn finish(&mut self, outcome: &BulkOutcome) {
        remove_ids(&mut self.items, outcome.removed());
        self.selection.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kbase_core::{BulkDeleteFailure, BulkDeleteResponse, BulkDeleteSuccess};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeTarget {
        counts: HashMap<String, i64>,
        broken: HashSet<String>,
        missing: HashSet<String>,
        deleted: Mutex<Vec<String>>,
        unreachable: bool,
    }

    #[async_trait]
    impl DeleteTarget for FakeTarget {
        async fn dependent_count(&self, id: &str) -> Result<i64> {
            Ok(self.counts.get(id).copied().unwrap_or(0))
        }

        async fn delete_one(&self, id: &str) -> Result<()> {
            if self.missing.contains(id) {
                return Err(Error::upstream(404, "not found"));
            }
            if self.broken.contains(id) {
                return Err(Error::upstream(500, "vector store unavailable"));
            }
            self.deleted.lock().unwrap().push(id.to_string());
            Ok(())
        }

        async fn delete_many(&self, ids: &[String]) -> Result<BulkDeleteResponse> {
            if self.unreachable {
                return Err(Error::Request("Backend unreachable".into()));
            }
            let mut resp = BulkDeleteResponse::default();
            for id in ids {
                if self.broken.contains(id) {
                    resp.failed.push(BulkDeleteFailure {
                        channel_id: id.clone(),
                        channel_title: String::new(),
                        error: "vector store unavailable".into(),
                    });
                } else {
                    resp.succeeded.push(BulkDeleteSuccess {
                        channel_id: id.clone(),
                        channel_title: String::new(),
                        videos_deleted: 0,
                        vectors_deleted: 0,
                        files_deleted: 0,
                    });
                }
            }
            Ok(resp)
        }
    }

    fn items() -> Vec<String> {
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    }

    fn flow(target: FakeTarget) -> DeleteFlow<String> {
        DeleteFlow::new(Arc::new(target), items())
    }

    #[tokio::test]
    async fn test_single_delete_with_warning_count() {
        let mut target = FakeTarget::default();
        target.counts.insert("b".into(), 7);
        let mut flow = flow(target);

        let pending = flow.request_single("b").await.unwrap();
        assert_eq!(pending.dependent_count, 7);

        let outcome = flow.confirm(pending).await;
        assert_eq!(outcome.removed(), ["b".to_string()]);
        assert_eq!(flow.items(), ["a".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn test_single_delete_not_found_is_success() {
        let mut target = FakeTarget::default();
        target.missing.insert("a".into());
        let mut flow = flow(target);

        let pending = flow.request_single("a").await.unwrap();
        let outcome = flow.confirm(pending).await;
        assert!(matches!(outcome, BulkOutcome::Success { .. }));
        assert_eq!(flow.items().len(), 2);
    }

    #[tokio::test]
    async fn test_single_delete_failure_keeps_list() {
        let mut target = FakeTarget::default();
        target.broken.insert("a".into());
        let mut flow = flow(target);

        let pending = flow.request_single("a").await.unwrap();
        let outcome = flow.confirm(pending).await;
        match outcome {
            BulkOutcome::Failed { failed, error } => {
                assert_eq!(failed, vec!["a".to_string()]);
                assert!(error.contains("vector store unavailable"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
        assert_eq!(flow.items(), items().as_slice());
    }

    #[tokio::test]
    async fn test_bulk_partial_removes_only_succeeded() {
        let mut target = FakeTarget::default();
        target.broken.insert("b".into());
        let mut flow = flow(target);

        flow.selection_mut().enter();
        for id in ["a", "b", "c"] {
            flow.selection_mut().toggle(id);
        }
        let pending = flow.request_bulk().unwrap();
        let outcome = flow.confirm_bulk(pending).await;

        assert!(outcome.is_partial());
        assert_eq!(outcome.failed(), ["b".to_string()]);
        assert_eq!(flow.items(), ["b".to_string()]);
        assert!(!flow.selection().is_active());
        assert!(flow.selection().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_transport_error_fails_all() {
        let target = FakeTarget {
            unreachable: true,
            ..Default::default()
        };
        let mut flow = flow(target);
        flow.selection_mut().enter();
        flow.selection_mut().insert("a");
        flow.selection_mut().insert("c");

        let pending = flow.request_bulk().unwrap();
        let outcome = flow.confirm_bulk(pending).await;
        assert_eq!(outcome.failed(), ["a".to_string(), "c".to_string()]);
        assert_eq!(flow.items().len(), 3);
        assert!(flow.selection().is_empty());
    }

    #[test]
    fn test_bulk_requires_selection() {
        let flow = flow(FakeTarget::default());
        assert!(matches!(flow.request_bulk(), Err(Error::InvalidInput(_))));
    }
}
