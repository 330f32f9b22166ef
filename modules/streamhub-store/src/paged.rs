//! Store for a cursor-paginated collection.

use std::sync::Arc;

use tokio::sync::watch;

use crate::cursor::CursorState;
use crate::sort::insert_sorted;
use crate::state::Shared;
use crate::traits::{CursorQuery, Entity, FetchPage};
use crate::{FetchOptions, ParamsOptions, StoreError};

#[derive(Clone)]
struct PagedData<T> {
    items: Vec<T>,
    cursor: CursorState,
}

/// A collection store paged through an opaque cursor.
///
/// `fetch` opens a fresh window (prior data discarded, cursor recomputed
/// wholesale); `fetch_more` is strictly additive and never re-orders items
/// already received — correctness relies on the server returning items in
/// exactly the order implied by the params.
pub struct PagedStore<T, Q> {
    shared: Shared<PagedData<T>, Q>,
    initial_data: PagedData<T>,
    initial_params: Q,
    fetcher: Arc<dyn FetchPage<T, Q>>,
}

impl<T, Q> PagedStore<T, Q>
where
    T: Entity,
    Q: CursorQuery,
{
    pub fn new(fetcher: Arc<dyn FetchPage<T, Q>>, initial_params: Q) -> Self {
        let initial = PagedData {
            items: Vec::new(),
            cursor: CursorState::default(),
        };
        Self {
            shared: Shared::new(initial.clone(), initial_params.clone()),
            initial_data: initial,
            initial_params,
            fetcher,
        }
    }

    /// Fetch the first page with the current params. The cursor pair is
    /// cleared on the request and the window and [`CursorState`] are
    /// recomputed wholesale from the response.
    pub async fn fetch(&self, options: FetchOptions) -> Result<(), StoreError> {
        let begun = self
            .shared
            .begin_fetch(options.ignore_loading, |state| state.data.items.clear());
        let Some((mut query, epoch)) = begun else {
            return Ok(());
        };
        query.set_cursor(None, None);
        let outcome = self.fetcher.fetch(&query).await;
        self.shared.commit_fetch(epoch, outcome, |state, page| {
            state.data.cursor = CursorState::from_page(&page);
            state.data.items = page.data;
        })
    }

    /// Fetch the next page, carrying the cursor pair from the previous one.
    /// Dropped while a fetch is in flight (absent override) and when the
    /// cursor reports no further page — neither case issues a request.
    pub async fn fetch_more(&self, options: FetchOptions) -> Result<(), StoreError> {
        let cursor = self.shared.read(|state| state.data.cursor.clone());
        if !cursor.has_next {
            tracing::debug!("fetch_more skipped: no further page");
            return Ok(());
        }
        let begun = self.shared.begin_fetch(options.ignore_loading, |_| {});
        let Some((mut query, epoch)) = begun else {
            return Ok(());
        };
        query.set_cursor(cursor.next_cursor, cursor.next_id_after);
        let outcome = self.fetcher.fetch(&query).await;
        self.shared.commit_fetch(epoch, outcome, |state, page| {
            state.data.cursor = CursorState::from_page(&page);
            state.data.items.extend(page.data);
        })
    }

    /// Insert an item. Duplicates (same key) are silently ignored and do not
    /// touch `total_count`; a successful insert increments it exactly once.
    pub fn add(&self, item: T) {
        self.shared.mutate(|state| {
            let key = item.key();
            if state.data.items.iter().any(|existing| existing.key() == key) {
                tracing::debug!(%key, "duplicate item ignored");
                return;
            }
            state.data.cursor.total_count += 1;
            match state.params.sort() {
                None => state.data.items.insert(0, item),
                Some((field, direction)) => {
                    insert_sorted(&mut state.data.items, item, &field, direction)
                }
            }
        });
    }

    /// Patch the element with the given key. Never re-sorts, even when the
    /// patch changed the sort key's value; position is re-evaluated only by
    /// `add` or the next full `fetch`.
    pub fn update(&self, key: &str, patch: impl FnOnce(&mut T)) {
        self.shared.mutate(|state| {
            if let Some(item) = state.data.items.iter_mut().find(|item| item.key() == key) {
                patch(item);
            }
        });
    }

    /// Remove the element with the given key. `total_count` is decremented
    /// only when an element was actually removed.
    pub fn delete(&self, key: &str) {
        self.shared.mutate(|state| {
            let before = state.data.items.len();
            state.data.items.retain(|item| item.key() != key);
            if state.data.items.len() < before {
                state.data.cursor.total_count = state.data.cursor.total_count.saturating_sub(1);
            }
        });
    }

    /// The server-reported total, not the local window length.
    pub fn count(&self) -> u64 {
        self.shared.read(|state| state.data.cursor.total_count)
    }

    pub fn has_next(&self) -> bool {
        self.shared.read(|state| state.data.cursor.has_next)
    }

    pub fn cursor(&self) -> CursorState {
        self.shared.read(|state| state.data.cursor.clone())
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
        self.shared.read(|state| state.data.items.clone())
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
