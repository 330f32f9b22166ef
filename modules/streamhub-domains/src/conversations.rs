//! Conversations and their direct messages.
//!
//! The conversation list and the per-conversation message window are both
//! cursor-paginated; new messages arrive over the messaging channel and are
//! inserted through the store's own primitives.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
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
pub struct ConversationDto {
    pub id: Uuid,
    pub participants: Vec<UserSummary>,
    #[serde(default)]
    pub last_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for ConversationDto {
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
pub struct ConversationQuery {
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

impl Query for ConversationQuery {
    fn sort(&self) -> Option<(String, SortDirection)> {
        Some((self.sort_by.clone()?, self.sort_direction?))
    }
}

impl CursorQuery for ConversationQuery {
    fn set_cursor(&mut self, cursor: Option<String>, id_after: Option<String>) {
        self.cursor = cursor;
        self.id_after = id_after;
    }
}

struct ConversationFetcher {
    api: Arc<ApiClient>,
}

#[async_trait]
impl FetchPage<ConversationDto, ConversationQuery> for ConversationFetcher {
    async fn fetch(&self, query: &ConversationQuery) -> Result<CursorPage<ConversationDto>> {
        Ok(self.api.get_with_query("/api/conversations", query).await?)
    }
}

pub type ConversationStore = PagedStore<ConversationDto, ConversationQuery>;

pub fn conversation_store(api: Arc<ApiClient>) -> ConversationStore {
    PagedStore::new(
        Arc::new(ConversationFetcher { api }),
        ConversationQuery::builder().build(),
    )
}

// ---------------------------------------------------------------------------
// Direct messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessageDto {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: UserSummary,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for DirectMessageDto {
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
pub struct DirectMessageQuery {
    /// Path parameter, not part of the query string.
    #[serde(skip)]
    pub conversation_id: Uuid,
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

impl Query for DirectMessageQuery {
    fn sort(&self) -> Option<(String, SortDirection)> {
        Some((self.sort_by.clone()?, self.sort_direction?))
    }
}

impl CursorQuery for DirectMessageQuery {
    fn set_cursor(&mut self, cursor: Option<String>, id_after: Option<String>) {
        self.cursor = cursor;
        self.id_after = id_after;
    }
}

struct DirectMessageFetcher {
    api: Arc<ApiClient>,
}

#[async_trait]
impl FetchPage<DirectMessageDto, DirectMessageQuery> for DirectMessageFetcher {
    async fn fetch(&self, query: &DirectMessageQuery) -> Result<CursorPage<DirectMessageDto>> {
        let path = format!("/api/conversations/{}/direct-messages", query.conversation_id);
        Ok(self.api.get_with_query(&path, query).await?)
    }
}

pub type DirectMessageStore = PagedStore<DirectMessageDto, DirectMessageQuery>;

pub fn direct_message_store(api: Arc<ApiClient>, conversation_id: Uuid) -> DirectMessageStore {
    PagedStore::new(
        Arc::new(DirectMessageFetcher { api }),
        DirectMessageQuery::builder()
            .conversation_id(conversation_id)
            .build(),
    )
}

fn conversation_destination(conversation_id: Uuid) -> String {
    format!("/sub/conversations/{conversation_id}")
}

/// Feed messages pushed for the store's conversation into it.
pub fn bind_direct_messages(ws: &WsManager, store: Arc<DirectMessageStore>) {
    let destination = conversation_destination(store.params().conversation_id);
    ws.subscribe(&destination, move |body| {
        match serde_json::from_value::<DirectMessageDto>(body) {
            Ok(message) => store.add(message),
            Err(err) => tracing::warn!(error = %err, "malformed direct message ignored"),
        }
    });
}

/// Publish a message to a conversation. Requires a connected channel;
/// otherwise the manager logs the dropped delivery.
pub fn send_direct_message(ws: &WsManager, conversation_id: Uuid, content: &str) {
    ws.send(
        &format!("/pub/conversations/{conversation_id}"),
        &json!({ "content": content }),
    );
}
