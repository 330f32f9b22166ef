//! The cursor-pagination wire contract.

use serde::{Deserialize, Serialize};

/// One page of a cursor-paginated list response.
///
/// The cursor pair (`nextCursor` + `nextIdAfter`) marks the boundary of this
/// page and must be echoed back verbatim on the following request; the id
/// gives a stable tie-break when the sort key has duplicate values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorPage<T> {
    pub data: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_id_after: Option<String>,
    #[serde(default)]
    pub has_next: Option<bool>,
    #[serde(default)]
    pub total_count: Option<u64>,
}

/// Pagination position owned by a [`PagedStore`](crate::PagedStore).
///
/// `has_next == false` forbids further page requests. `total_count` is the
/// server-reported total, not the local length; local inserts and removals
/// keep it in lockstep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CursorState {
    pub next_cursor: Option<String>,
    pub next_id_after: Option<String>,
    pub has_next: bool,
    pub total_count: u64,
}

impl CursorState {
    /// Recompute wholesale from a page response, applying the wire defaults
    /// (`hasNext` absent → false, `totalCount` absent → 0).
    pub fn from_page<T>(page: &CursorPage<T>) -> Self {
        Self {
            next_cursor: page.next_cursor.clone(),
            next_id_after: page.next_id_after.clone(),
            has_next: page.has_next.unwrap_or(false),
            total_count: page.total_count.unwrap_or(0),
        }
    }
}
