//! Live chat for a content room.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use streamhub_client::ApiClient;
use streamhub_common::UserSummary;
use streamhub_realtime::WsManager;
use streamhub_store::{Entity, FetchList, ListStore, Query, SortDirection, SortValue};
use typed_builder::TypedBuilder;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageDto {
    pub id: Uuid,
    pub sender: UserSummary,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for ChatMessageDto {
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

/// Chat history is a small bounded backlog, fetched in one shot. Ascending
/// sort keeps pushed messages appended in arrival order.
#[derive(Debug, Clone, Serialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct ChatQuery {
    /// Path parameter, not part of the query string.
    #[serde(skip)]
    pub content_id: Uuid,
    #[builder(default = 100)]
    pub limit: u32,
}

impl Query for ChatQuery {
    fn sort(&self) -> Option<(String, SortDirection)> {
        Some(("createdAt".to_string(), SortDirection::Ascending))
    }
}

struct ChatFetcher {
    api: Arc<ApiClient>,
}

#[async_trait]
impl FetchList<ChatMessageDto, ChatQuery> for ChatFetcher {
    async fn fetch(&self, query: &ChatQuery) -> Result<Vec<ChatMessageDto>> {
        let path = format!("/api/contents/{}/chat-messages", query.content_id);
        Ok(self.api.get_with_query(&path, query).await?)
    }
}

pub type ChatStore = ListStore<ChatMessageDto, ChatQuery>;

pub fn chat_store(api: Arc<ApiClient>, content_id: Uuid) -> ChatStore {
    ListStore::new(
        Arc::new(ChatFetcher { api }),
        ChatQuery::builder().content_id(content_id).build(),
    )
}

/// Feed chat messages pushed for the store's room into it.
pub fn bind_chat(ws: &WsManager, store: Arc<ChatStore>) {
    let destination = format!("/sub/contents/{}/chats", store.params().content_id);
    ws.subscribe(&destination, move |body| {
        match serde_json::from_value::<ChatMessageDto>(body) {
            Ok(message) => store.add(message),
            Err(err) => tracing::warn!(error = %err, "malformed chat message ignored"),
        }
    });
}

/// Publish a chat message to a room.
pub fn send_chat_message(ws: &WsManager, content_id: Uuid, content: &str) {
    ws.send(
        &format!("/pub/contents/{content_id}/chats"),
        &json!({ "content": content }),
    );
}
