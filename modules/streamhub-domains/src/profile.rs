//! A user's profile page data.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use streamhub_client::ApiClient;
use streamhub_common::UserRole;
use streamhub_store::{FetchSingle, Query, SingleStore};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: UserRole,
    pub locked: bool,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileQuery {
    #[serde(skip)]
    pub user_id: Uuid,
}

impl Query for ProfileQuery {}

struct ProfileFetcher {
    api: Arc<ApiClient>,
}

#[async_trait]
impl FetchSingle<UserDto, ProfileQuery> for ProfileFetcher {
    async fn fetch(&self, query: &ProfileQuery) -> Result<UserDto> {
        let path = format!("/api/users/{}", query.user_id);
        Ok(self.api.get(&path).await?)
    }
}

pub type ProfileStore = SingleStore<UserDto, ProfileQuery>;

pub fn profile_store(api: Arc<ApiClient>, user_id: Uuid) -> ProfileStore {
    SingleStore::new(Arc::new(ProfileFetcher { api }), ProfileQuery { user_id })
}
