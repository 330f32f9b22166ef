//! Store for an unordered collection fetched in one request.

use std::sync::Arc;

use tokio::sync::watch;

use crate::sort::insert_sorted;
use crate::state::Shared;
use crate::traits::{Entity, FetchList, Query};
use crate::{FetchOptions, ParamsOptions, StoreError};

/// A collection store without pagination. Elements are uniquely keyed by
/// [`Entity::key`]; local inserts respect the sort configured in params.
pub struct ListStore<T, Q> {
    shared: Shared<Vec<T>, Q>,
    initial_data: Vec<T>,
    initial_params: Q,
    fetcher: Arc<dyn FetchList<T, Q>>,
}

impl<T, Q> ListStore<T, Q>
where
    T: Entity,
    Q: Query,
{
    pub fn new(fetcher: Arc<dyn FetchList<T, Q>>, initial_params: Q) -> Self {
        Self {
            shared: Shared::new(Vec::new(), initial_params.clone()),
            initial_data: Vec::new(),
            initial_params,
            fetcher,
        }
    }

    pub fn with_initial_data(mut self, data: Vec<T>) -> Self {
        self.initial_data = data.clone();
        self.shared.mutate(|state| state.data = data);
        self
    }

    /// Fetch the whole collection, replacing `data` wholesale. Dropped while
    /// a fetch is in flight unless `ignore_loading` is set.
    pub async fn fetch(&self, options: FetchOptions) -> Result<(), StoreError> {
        let begun = self
            .shared
            .begin_fetch(options.ignore_loading, |state| state.data.clear());
        let Some((query, epoch)) = begun else {
            return Ok(());
        };
        let outcome = self.fetcher.fetch(&query).await;
        self.shared
            .commit_fetch(epoch, outcome, |state, items| state.data = items)
    }

    /// Insert an item. Duplicates (same key) are silently ignored. Without a
    /// configured sort the item is prepended; with one, the sequence order is
    /// preserved under the active comparator.
    pub fn add(&self, item: T) {
        self.shared.mutate(|state| {
            let key = item.key();
            if state.data.iter().any(|existing| existing.key() == key) {
                tracing::debug!(%key, "duplicate item ignored");
                return;
            }
            match state.params.sort() {
                None => state.data.insert(0, item),
                Some((field, direction)) => {
                    insert_sorted(&mut state.data, item, &field, direction)
                }
            }
        });
    }

    /// Patch the element with the given key. Never re-sorts, even when the
    /// patch changed the sort key's value; position is re-evaluated only by
    /// `add` or the next full `fetch`.
    pub fn update(&self, key: &str, patch: impl FnOnce(&mut T)) {
        self.shared.mutate(|state| {
            if let Some(item) = state.data.iter_mut().find(|item| item.key() == key) {
                patch(item);
            }
        });
    }

    /// Remove the element with the given key, if present.
    pub fn delete(&self, key: &str) {
        self.shared
            .mutate(|state| state.data.retain(|item| item.key() != key));
    }

    pub fn count(&self) -> usize {
        self.shared.read(|state| state.data.len())
    }

    /// Merge new params and refetch unless `auto_fetch` is disabled.
    pub async fn update_params(
        &self,
        mutate: impl FnOnce(&mut Q),
        options: ParamsOptions,
    ) -> Result<(), StoreError> {
        self.shared.mutate(|state| mutate(&mut state.params));
        if options.auto_fetch {
            self.fetch(FetchOptions::default()).await
        } else {
            Ok(())
        }
    }

    pub fn clear_data(&self) {
        self.shared
            .reset(&self.initial_data, &self.initial_params, |_| {});
    }

    pub fn clear_error(&self) {
        self.shared.mutate(|state| state.error = None);
    }

    pub fn clear(&self) {
        self.clear_data();
        self.clear_error();
    }

    pub fn data(&self) -> Vec<T> {
        self.shared.read(|state| state.data.clone())
    }

    pub fn params(&self) -> Q {
        self.shared.read(|state| state.params.clone())
    }

    pub fn loading(&self) -> bool {
        self.shared.read(|state| state.loading)
    }

    pub fn error(&self) -> Option<String> {
        self.shared.read(|state| state.error.clone())
    }

    /// Version channel bumped on every committed change.
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.shared.watch()
    }
}
