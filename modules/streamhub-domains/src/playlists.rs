//! Playlists a user curates or subscribes to. Ordered by last update so
//! recently touched playlists surface first.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use streamhub_client::ApiClient;
use streamhub_common::UserSummary;
use streamhub_store::{
    CursorPage, CursorQuery, Entity, FetchPage, PagedStore, Query, SortDirection, SortValue,
};
use typed_builder::TypedBuilder;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistDto {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub owner: UserSummary,
    pub subscriber_count: u64,
    #[serde(default)]
    pub subscribed_by_me: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for PlaylistDto {
    fn key(&self) -> String {
        self.id.to_string()
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "updatedAt" => Some(SortValue::Time(self.updated_at)),
            "createdAt" => Some(SortValue::Time(self.created_at)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistQuery {
    #[builder(default = 20)]
    pub limit: u32,
    #[builder(default = Some("updatedAt".to_string()))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[builder(default = Some(SortDirection::Descending))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_direction: Option<SortDirection>,
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_after: Option<String>,
}

impl Query for PlaylistQuery {
    fn sort(&self) -> Option<(String, SortDirection)> {
        Some((self.sort_by.clone()?, self.sort_direction?))
    }
}

impl CursorQuery for PlaylistQuery {
    fn set_cursor(&mut self, cursor: Option<String>, id_after: Option<String>) {
        self.cursor = cursor;
        self.id_after = id_after;
    }
}

struct PlaylistFetcher {
    api: Arc<ApiClient>,
}

#[async_trait]
impl FetchPage<PlaylistDto, PlaylistQuery> for PlaylistFetcher {
    async fn fetch(&self, query: &PlaylistQuery) -> Result<CursorPage<PlaylistDto>> {
        Ok(self.api.get_with_query("/api/playlists", query).await?)
    }
}

pub type PlaylistStore = PagedStore<PlaylistDto, PlaylistQuery>;

pub fn playlist_store(api: Arc<ApiClient>) -> PlaylistStore {
    PagedStore::new(
        Arc::new(PlaylistFetcher { api }),
        PlaylistQuery::builder().build(),
    )
}
