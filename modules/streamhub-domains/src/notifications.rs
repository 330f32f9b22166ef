//! User notifications, fed by the push stream.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use streamhub_client::ApiClient;
use streamhub_realtime::{SseManager, SsePayload};
use streamhub_store::{
    CursorPage, CursorQuery, Entity, FetchPage, PagedStore, Query, SortDirection, SortValue,
};
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// Topic name the server multiplexes notification events under.
pub const NOTIFICATION_TOPIC: &str = "notifications";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDto {
    pub id: Uuid,
    pub level: NotificationLevel,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for NotificationDto {
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

#[derive(Debug, Clone, Serialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
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

impl Query for NotificationQuery {
    fn sort(&self) -> Option<(String, SortDirection)> {
        Some((self.sort_by.clone()?, self.sort_direction?))
    }
}

impl CursorQuery for NotificationQuery {
    fn set_cursor(&mut self, cursor: Option<String>, id_after: Option<String>) {
        self.cursor = cursor;
        self.id_after = id_after;
    }
}

struct NotificationFetcher {
    api: Arc<ApiClient>,
}

#[async_trait]
impl FetchPage<NotificationDto, NotificationQuery> for NotificationFetcher {
    async fn fetch(&self, query: &NotificationQuery) -> Result<CursorPage<NotificationDto>> {
        Ok(self.api.get_with_query("/api/notifications", query).await?)
    }
}

pub type NotificationStore = PagedStore<NotificationDto, NotificationQuery>;

pub fn notification_store(api: Arc<ApiClient>) -> NotificationStore {
    PagedStore::new(
        Arc::new(NotificationFetcher { api }),
        NotificationQuery::builder().build(),
    )
}

/// Feed pushed notifications into the store. Sorted insertion keeps the
/// paginated window ordered; duplicates delivered after a refetch are
/// dropped by the engine.
pub fn bind_notifications(sse: &SseManager, store: Arc<NotificationStore>) {
    sse.subscribe(NOTIFICATION_TOPIC, move |payload| {
        let SsePayload::Json(value) = payload else {
            tracing::warn!("unparseable notification payload ignored");
            return;
        };
        match serde_json::from_value::<NotificationDto>(value) {
            Ok(notification) => store.add(notification),
            Err(err) => tracing::warn!(error = %err, "malformed notification ignored"),
        }
    });
}
