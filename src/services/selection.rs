use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::watch;

use crate::{
    domain::{
        errors::{BrowserError, BrowserResult},
        models::ObjectView,
        value_objects::ObjectId,
    },
    ports::StorageBackend,
    services::ObjectStore,
};

pub const DEFAULT_CONFIRMATION_THRESHOLD: usize = 1;

/// Multi-select over the current view of one folder.
///
/// The selected set is kept a subset of the ids in the current view: replacing the
/// view and deleting prune it, and any store mutation since the last check is synced
/// before the next toggle or delete.
pub struct SelectionManager {
    store: ObjectStore,
    backend: Arc<dyn StorageBackend>,
    threshold: usize,
    view: ObjectView,
    selected: BTreeSet<ObjectId>,
    revision: watch::Receiver<u64>,
}

impl SelectionManager {
    pub fn new(store: ObjectStore, backend: Arc<dyn StorageBackend>, view: ObjectView) -> Self {
        let revision = store.subscribe();
        Self {
            store,
            backend,
            threshold: DEFAULT_CONFIRMATION_THRESHOLD,
            view,
            selected: BTreeSet::new(),
            revision,
        }
    }

    /// Selections larger than `threshold` need `confirm = true` to delete
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn view(&self) -> &ObjectView {
        &self.view
    }

    pub fn selected(&self) -> &BTreeSet<ObjectId> {
        &self.selected
    }

    pub fn is_selected(&self, id: &ObjectId) -> bool {
        self.selected.contains(id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Flip the selection state of one visible object; returns whether it is now selected
    pub async fn toggle(&mut self, id: ObjectId) -> BrowserResult<bool> {
        self.sync_if_changed().await;
        if !self.view.contains(&id) {
            return Err(BrowserError::ObjectNotFound { id });
        }
        if self.selected.remove(&id) {
            Ok(false)
        } else {
            self.selected.insert(id);
            Ok(true)
        }
    }

    /// Make `view` current and select everything in it
    pub fn select_all(&mut self, view: ObjectView) {
        self.selected = view.ids();
        self.view = view;
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Replace the current view, e.g. after a filter or sort
    pub fn set_view(&mut self, view: ObjectView) {
        let visible = view.ids();
        self.selected.retain(|id| visible.contains(id));
        self.view = view;
    }

    /// Drop visible and selected objects that are no longer in the store
    pub async fn sync_with_store(&mut self) {
        self.revision.borrow_and_update();
        let present = self
            .store
            .existing(&self.view.bucket, &self.view.ids())
            .await;
        self.view.files.retain(|object| present.contains(&object.id));
        self.selected.retain(|id| present.contains(id));
    }

    async fn sync_if_changed(&mut self) {
        // A closed channel means the store is gone; keep the last view
        if self.revision.has_changed().unwrap_or(false) {
            self.sync_with_store().await;
        }
    }

    /// Delete every selected object from the backend, then from the store.
    ///
    /// Nothing is removed locally unless the backend accepted the whole batch.
    pub async fn bulk_delete(&mut self, confirm: bool) -> BrowserResult<usize> {
        self.sync_if_changed().await;
        if self.selected.is_empty() {
            return Ok(0);
        }

        let count = self.selected.len();
        if count > self.threshold && !confirm {
            return Err(BrowserError::ConfirmationRequired {
                count,
                threshold: self.threshold,
            });
        }

        let bucket = self.view.bucket.clone();
        let ids = self.selected.clone();

        let removed = match self.backend.delete_objects(&bucket, &ids).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(bucket = %bucket, count, error = %e, "Bulk delete rejected by backend");
                return Err(e);
            }
        };

        self.store.remove(&bucket, &ids).await?;
        self.view.files.retain(|object| !ids.contains(&object.id));
        self.selected.clear();

        tracing::info!(bucket = %bucket, removed, "Bulk delete completed");
        Ok(removed)
    }
}
