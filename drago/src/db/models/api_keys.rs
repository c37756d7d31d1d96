//! Database models for record-scoped API keys.

use crate::types::{ApiKeyId, RecordId, UserId};
use chrono::{DateTime, Utc};

/// Database request for creating a new API key. The secret arrives already hashed.
#[derive(Debug, Clone)]
pub struct ApiKeyCreateDBRequest {
    pub user_id: UserId,
    pub dns_record_id: RecordId,
    pub name: String,
    pub prefix: String,
    pub key_hash: String,
}

#[derive(Debug, Clone)]
pub struct ApiKeyFilter {
    pub user_id: UserId,
}

/// An `api_keys` row joined with the name and zone of the record it controls.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKeyDBResponse {
    pub id: ApiKeyId,
    pub user_id: UserId,
    pub dns_record_id: RecordId,
    pub record_name: String,
    pub zone_id: String,
    pub name: String,
    pub prefix: String,
    pub key_hash: String,
    pub last_used: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
