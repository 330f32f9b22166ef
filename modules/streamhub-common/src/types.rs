//! Wire types shared across the client modules.
//!
//! Field names follow the server's camelCase JSON contract. Resource DTOs
//! that feature stores bind to live in `streamhub-domains`; only the types
//! the gateway itself needs are defined here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Standardized error body returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub exception_name: String,
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

/// Compact user representation embedded in other resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

/// Access token pair issued on sign-in and refresh. The refresh token itself
/// travels in an http-only cookie and never appears in this body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtDto {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    User,
    Admin,
}
