//! Seams between the engine and feature code.

use anyhow::Result;
use async_trait::async_trait;

use crate::cursor::CursorPage;
use crate::sort::{SortDirection, SortValue};

/// Entities stored in a collection. The key uniquely identifies an element
/// (the original contract keys on an `id` field); `sort_value` exposes the
/// fields a collection may be sorted on.
pub trait Entity: Clone + Send + Sync + 'static {
    fn key(&self) -> String;

    /// The ordering key for a named sort field, or `None` when the entity
    /// has no such field. Elements without a value keep their position.
    fn sort_value(&self, _field: &str) -> Option<SortValue> {
        None
    }
}

/// Query/filter/sort parameters carried by a store.
pub trait Query: Clone + Send + Sync + 'static {
    /// The active sort field and direction, when one is configured.
    fn sort(&self) -> Option<(String, SortDirection)> {
        None
    }
}

/// Params for cursor-paginated endpoints. The engine clears the cursor pair
/// on a full `fetch` and echoes the previous page's pair on `fetch_more`.
pub trait CursorQuery: Query {
    fn set_cursor(&mut self, cursor: Option<String>, id_after: Option<String>);
}

/// Fetches a single entity.
#[async_trait]
pub trait FetchSingle<T, Q>: Send + Sync {
    async fn fetch(&self, query: &Q) -> Result<T>;
}

/// Fetches an entire collection in one request.
#[async_trait]
pub trait FetchList<T, Q>: Send + Sync {
    async fn fetch(&self, query: &Q) -> Result<Vec<T>>;
}

/// Fetches one page of a cursor-paginated collection.
#[async_trait]
pub trait FetchPage<T, Q>: Send + Sync {
    async fn fetch(&self, query: &Q) -> Result<CursorPage<T>>;
}
