//! Reviews left on a content item.

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
pub struct ReviewDto {
    pub id: Uuid,
    pub content_id: Uuid,
    pub author: UserSummary,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for ReviewDto {
    fn key(&self) -> String {
        self.id.to_string()
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "createdAt" => Some(SortValue::Time(self.created_at)),
            "rating" => Some(SortValue::Number(f64::from(self.rating))),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct ReviewQuery {
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<Uuid>,
    #[builder(default = 20)]
    pub limit: u32,
    #[builder(default = Some("createdAt".to_string()))]
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

impl Query for ReviewQuery {
    fn sort(&self) -> Option<(String, SortDirection)> {
        Some((self.sort_by.clone()?, self.sort_direction?))
    }
}

impl CursorQuery for ReviewQuery {
    fn set_cursor(&mut self, cursor: Option<String>, id_after: Option<String>) {
        self.cursor = cursor;
        self.id_after = id_after;
    }
}

struct ReviewFetcher {
    api: Arc<ApiClient>,
}

#[async_trait]
impl FetchPage<ReviewDto, ReviewQuery> for ReviewFetcher {
    async fn fetch(&self, query: &ReviewQuery) -> Result<CursorPage<ReviewDto>> {
        Ok(self.api.get_with_query("/api/reviews", query).await?)
    }
}

pub type ReviewStore = PagedStore<ReviewDto, ReviewQuery>;

pub fn review_store(api: Arc<ApiClient>) -> ReviewStore {
    PagedStore::new(Arc::new(ReviewFetcher { api }), ReviewQuery::builder().build())
}
