//! Who is currently watching a content item.
//!
//! The session list is paginated ascending by join time; join/leave changes
//! arrive as push events and are applied through `add`/`delete`, which keep
//! `total_count` in lockstep with the sequence.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use streamhub_client::ApiClient;
use streamhub_common::UserSummary;
use streamhub_realtime::WsManager;
use streamhub_store::{
    CursorPage, CursorQuery, Entity, FetchPage, PagedStore, Query, SortDirection, SortValue,
};
use typed_builder::TypedBuilder;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchSessionDto {
    pub id: Uuid,
    pub content_id: Uuid,
    pub watcher: UserSummary,
    pub created_at: DateTime<Utc>,
}

impl Entity for WatchSessionDto {
    fn key(&self) -> String {
        self.id.to_string()
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "createdAt" => Some(SortValue::Time(self.created_at)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WatchSessionChangeKind {
    Join,
    Leave,
}

/// Push event announcing a watcher joining or leaving.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchSessionChange {
    #[serde(rename = "type")]
    pub kind: WatchSessionChangeKind,
    pub watching_session: WatchSessionDto,
    pub watcher_count: u64,
}

#[derive(Debug, Clone, Serialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct WatchSessionQuery {
    /// Path parameter, not part of the query string.
    #[serde(skip)]
    pub content_id: Uuid,
    #[builder(default = 50)]
    pub limit: u32,
    #[builder(default = Some("createdAt".to_string()))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[builder(default = Some(SortDirection::Ascending))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_direction: Option<SortDirection>,
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_after: Option<String>,
}

impl Query for WatchSessionQuery {
    fn sort(&self) -> Option<(String, SortDirection)> {
        Some((self.sort_by.clone()?, self.sort_direction?))
    }
}

impl CursorQuery for WatchSessionQuery {
    fn set_cursor(&mut self, cursor: Option<String>, id_after: Option<String>) {
        self.cursor = cursor;
        self.id_after = id_after;
    }
}

struct WatchSessionFetcher {
    api: Arc<ApiClient>,
}

#[async_trait]
impl FetchPage<WatchSessionDto, WatchSessionQuery> for WatchSessionFetcher {
    async fn fetch(&self, query: &WatchSessionQuery) -> Result<CursorPage<WatchSessionDto>> {
        let path = format!("/api/contents/{}/watch-sessions", query.content_id);
        Ok(self.api.get_with_query(&path, query).await?)
    }
}

pub type WatchSessionStore = PagedStore<WatchSessionDto, WatchSessionQuery>;

pub fn watch_session_store(api: Arc<ApiClient>, content_id: Uuid) -> WatchSessionStore {
    PagedStore::new(
        Arc::new(WatchSessionFetcher { api }),
        WatchSessionQuery::builder().content_id(content_id).build(),
    )
}

/// Apply join/leave changes pushed for the store's content item.
pub fn bind_watch_sessions(ws: &WsManager, store: Arc<WatchSessionStore>) {
    let destination = format!("/sub/contents/{}/watch-sessions", store.params().content_id);
    ws.subscribe(&destination, move |body| {
        let change = match serde_json::from_value::<WatchSessionChange>(body) {
            Ok(change) => change,
            Err(err) => {
                tracing::warn!(error = %err, "malformed watch-session change ignored");
                return;
            }
        };
        match change.kind {
            WatchSessionChangeKind::Join => store.add(change.watching_session),
            WatchSessionChangeKind::Leave => {
                store.delete(&change.watching_session.id.to_string())
            }
        }
    });
}
