//! Store for a single remote entity.

use std::sync::Arc;

use tokio::sync::watch;

use crate::state::Shared;
use crate::traits::{FetchSingle, Query};
use crate::{FetchOptions, ParamsOptions, StoreError};

/// A `{data, params, loading, error}` store whose data is one entity or
/// absent.
pub struct SingleStore<T, Q> {
    shared: Shared<Option<T>, Q>,
    initial_data: Option<T>,
    initial_params: Q,
    fetcher: Arc<dyn FetchSingle<T, Q>>,
}

impl<T, Q> SingleStore<T, Q>
where
    T: Clone + Send + Sync + 'static,
    Q: Query,
{
    pub fn new(fetcher: Arc<dyn FetchSingle<T, Q>>, initial_params: Q) -> Self {
        Self {
            shared: Shared::new(None, initial_params.clone()),
            initial_data: None,
            initial_params,
            fetcher,
        }
    }

    pub fn with_initial_data(mut self, data: T) -> Self {
        self.initial_data = Some(data.clone());
        self.shared.mutate(|state| state.data = Some(data));
        self
    }

    /// Fetch the entity with the current params, replacing `data` wholesale.
    /// A call while one is already in flight is dropped (no second request)
    /// unless `ignore_loading` is set. Failures are recorded in `error` and
    /// returned for callers that opted into propagation.
    pub async fn fetch(&self, options: FetchOptions) -> Result<(), StoreError> {
        let Some((query, epoch)) = self.shared.begin_fetch(options.ignore_loading, |_| {}) else {
            return Ok(());
        };
        let outcome = self.fetcher.fetch(&query).await;
        self.shared
            .commit_fetch(epoch, outcome, |state, value| state.data = Some(value))
    }

    /// Apply a field patch to the entity when present.
    pub fn update(&self, patch: impl FnOnce(&mut T)) {
        self.shared.mutate(|state| {
            if let Some(data) = state.data.as_mut() {
                patch(data);
            }
        });
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

    /// Reset to the initial snapshot, forcing `loading = false`. Any fetch
    /// still in flight will have its result dropped.
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

    pub fn data(&self) -> Option<T> {
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
