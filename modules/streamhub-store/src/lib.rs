//! Reactive stores for remote resources.
//!
//! Every remote resource gets one of three shapes, all sharing the same
//! `{data, params, loading, error}` contract:
//!
//! - [`SingleStore`] — one entity or absent.
//! - [`ListStore`] — an unordered collection fetched in one shot.
//! - [`PagedStore`] — a cursor-paginated collection with `fetch_more`.
//!
//! State is only ever mutated through a store's own operations. Collaborators
//! observe changes through the store's [`watch`](SingleStore::watch) channel
//! and read snapshots through accessors.

pub mod cursor;
pub mod list;
pub mod paged;
pub mod single;
pub mod sort;
pub mod traits;

mod state;

pub use cursor::{CursorPage, CursorState};
pub use list::ListStore;
pub use paged::PagedStore;
pub use single::SingleStore;
pub use sort::{SortDirection, SortValue};
pub use traits::{CursorQuery, Entity, FetchList, FetchPage, FetchSingle, Query};

use thiserror::Error;

/// Errors surfaced by store operations. Every failure is also recorded in
/// the store's `error` field; the returned value exists for callers that
/// opted into propagation.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("{0}")]
    Fetch(String),
}

/// Options for `fetch` / `fetch_more`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Bypass the at-most-one-fetch-in-flight guard.
    pub ignore_loading: bool,
}

/// Options for `update_params`.
#[derive(Debug, Clone, Copy)]
pub struct ParamsOptions {
    /// Refetch immediately after the params change. Defaults to true.
    pub auto_fetch: bool,
}

impl Default for ParamsOptions {
    fn default() -> Self {
        Self { auto_fetch: true }
    }
}
