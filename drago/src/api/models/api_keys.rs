//! API request/response models for record-scoped API keys.

use crate::db::models::api_keys::ApiKeyDBResponse;
use crate::types::{ApiKeyId, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ApiKeyCreate {
    pub name: String,
    /// The DNS record this key will control
    pub record_id: RecordId,
}

/// Key metadata. The secret is never returned after creation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ApiKeyId,
    pub name: String,
    pub record_id: RecordId,
    pub record_name: String,
    pub zone_id: String,
    pub prefix: String,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
}

impl From<ApiKeyDBResponse> for ApiKeyResponse {
    fn from(db: ApiKeyDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            record_id: db.dns_record_id,
            record_name: db.record_name,
            zone_id: db.zone_id,
            prefix: db.prefix,
            created_at: db.created_at,
            last_used: db.last_used,
        }
    }
}

/// Returned once, at creation. `key` is the only time the full secret is visible.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyCreatedResponse {
    #[serde(flatten)]
    pub api_key: ApiKeyResponse,
    pub key: String,
}
